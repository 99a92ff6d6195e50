//! Presentation target seam and an in-memory root node

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::constants::presentation::{CLASS_ATTRIBUTE, STYLE_ATTRIBUTE};

/// Root node whose attributes, style and classes carry the presentation
pub trait PresentationTarget {
    fn attribute(&self, name: &str) -> Option<String>;
    fn set_attribute(&self, name: &str, value: &str);

    /// Current value of the `color-scheme` style channel
    fn color_scheme(&self) -> Option<String>;
    fn set_color_scheme(&self, value: &str);

    fn has_class(&self, token: &str) -> bool;
    fn add_class(&self, token: &str);
    /// Replace `old` with `new`; false if `old` was not present
    fn replace_class(&self, old: &str, new: &str) -> bool;
}

/// One observed change of the presentation target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    /// Attribute name, or `style` / `class` for the mirror channels
    pub attribute: String,
    pub old_value: Option<String>,
}

impl Mutation {
    pub fn attribute(name: &str, old_value: Option<String>) -> Self {
        Self {
            attribute: name.to_string(),
            old_value,
        }
    }
}

#[derive(Debug, Default)]
struct ElementData {
    attributes: BTreeMap<String, String>,
    color_scheme: Option<String>,
    classes: Vec<String>,
    records: Vec<Mutation>,
}

impl ElementData {
    fn class_list(&self) -> Option<String> {
        (!self.classes.is_empty()).then(|| self.classes.join(" "))
    }

    fn style(&self) -> Option<String> {
        self.color_scheme.as_ref().map(|scheme| format!("color-scheme: {scheme};"))
    }
}

/// In-memory root node that records every effective change
///
/// Writing a channel with its current value records nothing. The host
/// drains [`Element::take_records`] and hands the records back to the
/// presentation owner as observed edits, the owner's own writes included.
#[derive(Debug, Default)]
pub struct Element {
    data: RefCell<ElementData>,
}

impl Element {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded mutations
    pub fn take_records(&self) -> Vec<Mutation> {
        std::mem::take(&mut self.data.borrow_mut().records)
    }

    pub fn classes(&self) -> Vec<String> {
        self.data.borrow().classes.clone()
    }

    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.data.borrow().attributes.clone()
    }

    /// Remove a class token (external edits in tests and the CLI)
    pub fn remove_class(&self, token: &str) {
        let mut data = self.data.borrow_mut();
        if !data.classes.iter().any(|class| class == token) {
            return;
        }
        let old_value = data.class_list();
        data.classes.retain(|class| class != token);
        data.records.push(Mutation::attribute(CLASS_ATTRIBUTE, old_value));
    }
}

impl PresentationTarget for Element {
    fn attribute(&self, name: &str) -> Option<String> {
        self.data.borrow().attributes.get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: &str) {
        let mut data = self.data.borrow_mut();
        let old_value = data.attributes.insert(name.to_string(), value.to_string());
        if old_value.as_deref() != Some(value) {
            data.records.push(Mutation::attribute(name, old_value));
        }
    }

    fn color_scheme(&self) -> Option<String> {
        self.data.borrow().color_scheme.clone()
    }

    fn set_color_scheme(&self, value: &str) {
        let mut data = self.data.borrow_mut();
        if data.color_scheme.as_deref() == Some(value) {
            return;
        }
        let old_value = data.style();
        data.color_scheme = Some(value.to_string());
        data.records.push(Mutation::attribute(STYLE_ATTRIBUTE, old_value));
    }

    fn has_class(&self, token: &str) -> bool {
        self.data.borrow().classes.iter().any(|class| class == token)
    }

    fn add_class(&self, token: &str) {
        let mut data = self.data.borrow_mut();
        if data.classes.iter().any(|class| class == token) {
            return;
        }
        let old_value = data.class_list();
        data.classes.push(token.to_string());
        data.records.push(Mutation::attribute(CLASS_ATTRIBUTE, old_value));
    }

    fn replace_class(&self, old: &str, new: &str) -> bool {
        let mut data = self.data.borrow_mut();
        let Some(index) = data.classes.iter().position(|class| class == old) else {
            return false;
        };
        let old_value = data.class_list();
        if data.classes.iter().any(|class| class == new) {
            data.classes.remove(index);
        } else {
            data.classes[index] = new.to_string();
        }
        data.records.push(Mutation::attribute(CLASS_ATTRIBUTE, old_value));
        true
    }
}
