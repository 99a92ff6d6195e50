//! Presentation owner
//!
//! Owns the side effects on the presentation target: one `data-<prop>`
//! attribute per property, and the resolved appearance of the mode property
//! mirrored onto the configured selectors. Every write is guarded so an
//! unchanged value never touches the target, which keeps observers of the
//! target quiet and the owners free of feedback loops.
//!
//! When attribute observation is enabled, external edits of owned
//! attributes are validated and published as `PresentationChanged`; edits
//! of the appearance mirrors are reverted, since the mirror is derived from
//! the mode value.

mod preference;
mod target;

pub use preference::{FixedPreference, PreferenceOracle};
pub use target::{Element, Mutation, PresentationTarget};

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::config::{Appearance, Compiled, Observer, Selector};
use crate::constants::presentation::{ATTRIBUTE_PREFIX, CLASS_ATTRIBUTE, STYLE_ATTRIBUTE};
use crate::error::SyncError;
use crate::events::{Event, EventBus};
use crate::state::{self, State};
use crate::validation::sanitize_value;

/// Attribute name carrying a property
pub fn attribute_name(prop: &str) -> String {
    format!("{ATTRIBUTE_PREFIX}{prop}")
}

pub struct PresentationOwner {
    target: Rc<dyn PresentationTarget>,
    oracle: Rc<dyn PreferenceOracle>,
    compiled: Rc<Compiled>,
    bus: Rc<EventBus>,
    /// `None` until the first write
    state: RefCell<Option<State>>,
    resolved: Cell<Option<Appearance>>,
}

impl PresentationOwner {
    pub fn new(
        target: Rc<dyn PresentationTarget>,
        oracle: Rc<dyn PreferenceOracle>,
        compiled: Rc<Compiled>,
        bus: Rc<EventBus>,
    ) -> Self {
        Self {
            target,
            oracle,
            compiled,
            bus,
            state: RefCell::new(None),
            resolved: Cell::new(None),
        }
    }

    /// Current presentation state; fails before the first write
    pub fn read(&self) -> Result<State, SyncError> {
        self.state
            .borrow()
            .clone()
            .ok_or(SyncError::NotInitialized("presentation state"))
    }

    /// Appearance currently mirrored onto the selectors
    pub fn resolved_appearance(&self) -> Option<Appearance> {
        self.resolved.get()
    }

    /// Merge `values` over the current state and apply the differences
    pub fn write(&self, values: &State) {
        let merged = {
            let current = self.state.borrow();
            state::merge(current.as_ref().unwrap_or(&State::new()), values)
        };

        for (prop, value) in &merged {
            let name = attribute_name(prop);
            if self.target.attribute(&name).as_deref() != Some(value.as_str()) {
                debug!(attribute = %name, value = %value, "Setting attribute");
                self.target.set_attribute(&name, value);
            }
        }

        let resolved = self.resolve(&merged);
        *self.state.borrow_mut() = Some(merged);
        if let Some(appearance) = resolved {
            self.apply_appearance(appearance);
        }
    }

    /// Resolve the mode value in `values` to an appearance
    ///
    /// The system pseudo-value asks the oracle, falling back to the declared
    /// fallback value's appearance when the host cannot report one.
    pub fn resolve(&self, values: &State) -> Option<Appearance> {
        let mode = self.compiled.mode.as_ref()?;
        let value = values.get(&mode.prop)?;

        match &mode.system {
            Some(system) if &system.value == value => self
                .oracle
                .preference()
                .or_else(|| mode.appearance_of(&system.fallback)),
            _ => mode.appearance_of(value),
        }
    }

    /// Re-resolve after the live preference changed; returns true if the mirrors moved
    pub fn refresh_preference(&self) -> bool {
        let Ok(state) = self.read() else {
            return false;
        };
        let Some(appearance) = self.resolve(&state) else {
            return false;
        };
        if self.resolved.get() == Some(appearance) {
            return false;
        }
        info!(appearance = %appearance, "Preference changed, updating mirrors");
        self.apply_appearance(appearance);
        true
    }

    /// Attributes a host should observe on the target
    pub fn observed_attributes(&self) -> Vec<String> {
        let mut attributes: Vec<String> = self.compiled.constraints.keys().map(|prop| attribute_name(prop)).collect();
        if let Some(mode) = &self.compiled.mode {
            if mode.selectors.contains(&Selector::ColorScheme) {
                attributes.push(STYLE_ATTRIBUTE.to_string());
            }
            if mode.selectors.contains(&Selector::Class) {
                attributes.push(CLASS_ATTRIBUTE.to_string());
            }
        }
        attributes
    }

    /// Fold observed edits of the target back in
    ///
    /// Records are coalesced per attribute, keeping the old value of the last
    /// record, so a batch holding our own write followed by an external edit
    /// validates against what preceded the external edit. Every owned
    /// attribute in the batch is read back and sanitized before anything is
    /// written, then the adopted values are published together as one
    /// `PresentationChanged`, which is also returned.
    pub fn handle_mutations(&self, records: &[Mutation]) -> Option<State> {
        if !self.compiled.observes(Observer::Attributes) {
            debug!("Attribute observation disabled, ignoring mutations");
            return None;
        }
        let current = self.state.borrow().clone();
        let Some(current) = current else {
            debug!("Presentation not initialized, ignoring mutations");
            return None;
        };

        let mut latest: BTreeMap<&str, Option<&str>> = BTreeMap::new();
        for record in records {
            latest.insert(record.attribute.as_str(), record.old_value.as_deref());
        }

        let mut values = State::new();
        let mut mirrors = Vec::new();
        for (attribute, old_value) in latest {
            match attribute {
                STYLE_ATTRIBUTE => mirrors.push(Selector::ColorScheme),
                CLASS_ATTRIBUTE => mirrors.push(Selector::Class),
                name => {
                    if let Some((prop, sanitized)) = self.sanitize_attribute(name, old_value) {
                        values.insert(prop.to_string(), sanitized);
                    }
                }
            }
        }

        if !values.is_empty() {
            self.write(&values);
        }
        for selector in mirrors {
            self.reconcile_mirror(selector);
        }

        let adopted: State = values
            .into_iter()
            .filter(|(prop, value)| current.get(prop) != Some(value))
            .collect();
        if adopted.is_empty() {
            return None;
        }

        info!(state = ?adopted, "Adopting external attribute edits");
        self.bus.emit(&Event::PresentationChanged(adopted.clone()));
        Some(adopted)
    }

    /// Current value of an owned attribute, sanitized against its previous value
    fn sanitize_attribute<'a>(&self, name: &'a str, old_value: Option<&str>) -> Option<(&'a str, String)> {
        let prop = name.strip_prefix(ATTRIBUTE_PREFIX)?;
        let Some(constraint) = self.compiled.constraints.get(prop) else {
            debug!(attribute = %name, "Ignoring mutation of unowned attribute");
            return None;
        };

        let new_value = self.target.attribute(name);
        let (sanitized, passed) = sanitize_value(constraint, new_value.as_deref(), old_value);
        if !passed {
            warn!(attribute = %name, value = ?new_value, sanitized = %sanitized, "Repairing invalid attribute");
        }
        Some((prop, sanitized.to_string()))
    }

    /// Revert an external edit of a mirror channel
    fn reconcile_mirror(&self, selector: Selector) {
        let Some(mode) = &self.compiled.mode else {
            return;
        };
        if !mode.selectors.contains(&selector) {
            return;
        }
        let Some(appearance) = self.resolved.get() else {
            return;
        };
        match selector {
            Selector::ColorScheme => self.apply_color_scheme(appearance),
            Selector::Class => self.apply_class(appearance),
        }
    }

    fn apply_appearance(&self, appearance: Appearance) {
        self.resolved.set(Some(appearance));
        let Some(mode) = &self.compiled.mode else {
            return;
        };
        if mode.selectors.contains(&Selector::ColorScheme) {
            self.apply_color_scheme(appearance);
        }
        if mode.selectors.contains(&Selector::Class) {
            self.apply_class(appearance);
        }
    }

    fn apply_color_scheme(&self, appearance: Appearance) {
        if self.target.color_scheme().as_deref() != Some(appearance.as_str()) {
            debug!(appearance = %appearance, "Setting color-scheme");
            self.target.set_color_scheme(appearance.as_str());
        }
    }

    fn apply_class(&self, appearance: Appearance) {
        let wanted = appearance.as_str();
        let other = appearance.opposite().as_str();
        let has_other = self.target.has_class(other);
        if self.target.has_class(wanted) && !has_other {
            return;
        }
        debug!(appearance = %appearance, "Setting appearance class");
        if !(has_other && self.target.replace_class(other, wanted)) {
            self.target.add_class(wanted);
        }
    }
}

impl std::fmt::Debug for PresentationOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationOwner")
            .field("state", &self.state.borrow())
            .field("resolved", &self.resolved.get())
            .finish()
    }
}
