//! Validation/resolution strategies attached to properties

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Appearance;
use crate::constants::keys;

/// Rule deciding which values a property accepts and what it defaults to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Strategy {
    /// One fixed value, which is also the base
    Mono {
        key: String,
        /// Appearance when used as the mode property
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color_scheme: Option<Appearance>,
    },
    /// Explicit finite set of values
    Multi { keys: MultiKeys, base: String },
    /// Light and dark keys plus optional custom extras
    LightDark {
        base: String,
        #[serde(default)]
        custom_keys: CustomKeys,
    },
    /// As `LightDark`, plus a pseudo-value resolved from the live preference
    System {
        base: String,
        /// Value whose appearance is used when no preference is reported
        fallback: String,
        #[serde(default)]
        custom_keys: CustomKeys,
    },
}

/// Allowed values of a `multi` strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultiKeys {
    /// Plain list, usable by generic properties
    List(Vec<String>),
    /// Values mapped to appearances, usable by the mode property
    Map(BTreeMap<String, Appearance>),
}

impl MultiKeys {
    pub fn values(&self) -> Vec<String> {
        match self {
            MultiKeys::List(list) => list.clone(),
            MultiKeys::Map(map) => map.keys().cloned().collect(),
        }
    }
}

/// Renamed light/dark/system keys and custom extras
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CustomKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, Appearance>,
}

impl CustomKeys {
    pub fn light(&self) -> &str {
        self.light.as_deref().unwrap_or(keys::LIGHT)
    }

    pub fn dark(&self) -> &str {
        self.dark.as_deref().unwrap_or(keys::DARK)
    }

    pub fn system(&self) -> &str {
        self.system.as_deref().unwrap_or(keys::SYSTEM)
    }
}

impl Strategy {
    /// `light_dark` with default key names
    pub fn light_dark(base: &str) -> Self {
        Strategy::LightDark {
            base: base.to_string(),
            custom_keys: CustomKeys::default(),
        }
    }

    /// `system` with default key names
    pub fn system(base: &str, fallback: &str) -> Self {
        Strategy::System {
            base: base.to_string(),
            fallback: fallback.to_string(),
            custom_keys: CustomKeys::default(),
        }
    }

    /// `multi` over a plain list of values
    pub fn multi<'a>(keys: impl IntoIterator<Item = &'a str>, base: &str) -> Self {
        Strategy::Multi {
            keys: MultiKeys::List(keys.into_iter().map(str::to_string).collect()),
            base: base.to_string(),
        }
    }

    /// `mono` with a single value
    pub fn mono(key: &str) -> Self {
        Strategy::Mono {
            key: key.to_string(),
            color_scheme: None,
        }
    }

    /// The compiled default value
    pub fn base(&self) -> &str {
        match self {
            Strategy::Mono { key, .. } => key,
            Strategy::Multi { base, .. }
            | Strategy::LightDark { base, .. }
            | Strategy::System { base, .. } => base,
        }
    }

    /// Every value the strategy accepts, in declaration order
    pub fn allowed(&self) -> Vec<String> {
        match self {
            Strategy::Mono { key, .. } => vec![key.clone()],
            Strategy::Multi { keys, .. } => keys.values(),
            Strategy::LightDark { custom_keys, .. } => {
                let mut values = vec![custom_keys.light().to_string(), custom_keys.dark().to_string()];
                values.extend(custom_keys.custom.keys().cloned());
                values
            }
            Strategy::System { custom_keys, .. } => {
                let mut values = vec![
                    custom_keys.light().to_string(),
                    custom_keys.dark().to_string(),
                    custom_keys.system().to_string(),
                ];
                values.extend(custom_keys.custom.keys().cloned());
                values
            }
        }
    }

    /// Value to appearance mapping when used as the mode property
    ///
    /// The system pseudo-value is absent: it has no fixed appearance.
    pub fn appearances(&self) -> BTreeMap<String, Appearance> {
        match self {
            Strategy::Mono { key, color_scheme } => color_scheme
                .map(|appearance| BTreeMap::from([(key.clone(), appearance)]))
                .unwrap_or_default(),
            Strategy::Multi { keys: MultiKeys::Map(map), .. } => map.clone(),
            Strategy::Multi { keys: MultiKeys::List(_), .. } => BTreeMap::new(),
            Strategy::LightDark { custom_keys, .. } | Strategy::System { custom_keys, .. } => {
                let mut map = BTreeMap::from([
                    (custom_keys.light().to_string(), Appearance::Light),
                    (custom_keys.dark().to_string(), Appearance::Dark),
                ]);
                for (key, appearance) in &custom_keys.custom {
                    map.insert(key.clone(), *appearance);
                }
                map
            }
        }
    }
}
