//! Declarative configuration for theme-sync
//!
//! This module provides two layers:
//! - **Config**: the parsed declarative configuration (deserialized from JSON
//!   or built in code), supplied once at construction and never mutated
//! - **compiler**: turns a Config into the immutable validation constraints
//!   and mode-resolution metadata everything else reads

pub mod compiler;
pub mod strategy;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::constants;
use crate::error::ConfigError;

pub use compiler::{Compiled, Constraint, Constraints, ModeHandling, SystemResolution, compile};
pub use strategy::{CustomKeys, MultiKeys, Strategy};

/// One of the two binary appearances a mode value resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    Light,
    Dark,
}

impl Appearance {
    pub fn as_str(self) -> &'static str {
        match self {
            Appearance::Light => constants::keys::LIGHT,
            Appearance::Dark => constants::keys::DARK,
        }
    }

    /// The other appearance (used to swap class tokens)
    pub fn opposite(self) -> Self {
        match self {
            Appearance::Light => Appearance::Dark,
            Appearance::Dark => Appearance::Light,
        }
    }

    /// Parse a presentation token back into an appearance
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            constants::keys::LIGHT => Some(Appearance::Light),
            constants::keys::DARK => Some(Appearance::Dark),
            _ => None,
        }
    }
}

impl fmt::Display for Appearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation side channel mirroring the resolved appearance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Selector {
    /// Style-like `color-scheme` channel
    ColorScheme,
    /// Token-list channel holding a `light` or `dark` class
    Class,
}

/// External feeds the core listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Observer {
    /// Cross-context storage notifications
    Storage,
    /// Structural mutations of the presentation target
    Attributes,
}

/// Role of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropKind {
    #[default]
    Generic,
    /// Resolves to an appearance mirrored onto the selectors
    Mode,
}

/// Configuration of a single property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropConfig {
    #[serde(flatten)]
    pub strategy: Strategy,

    #[serde(rename = "type", default)]
    pub kind: PropKind,

    /// Mode only: channels mirroring the resolved appearance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectors: Vec<Selector>,

    /// Mode only: also persist the raw mode value under its own key
    #[serde(default)]
    pub store: bool,

    /// Mode only: dedicated key for the raw mode value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
}

impl PropConfig {
    /// Generic property with the given strategy
    pub fn generic(strategy: Strategy) -> Self {
        Self {
            strategy,
            kind: PropKind::Generic,
            selectors: Vec::new(),
            store: false,
            storage_key: None,
        }
    }

    /// Mode property with the given strategy and selectors
    pub fn mode(strategy: Strategy, selectors: &[Selector]) -> Self {
        Self {
            strategy,
            kind: PropKind::Mode,
            selectors: selectors.to_vec(),
            store: false,
            storage_key: None,
        }
    }

    /// Persist the raw mode value under `key` (or the default key)
    pub fn persisted(mut self, key: Option<&str>) -> Self {
        self.store = true;
        self.storage_key = key.map(str::to_string);
        self
    }
}

/// Top-level declarative configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    #[serde(default)]
    pub observers: BTreeSet<Observer>,

    #[serde(default)]
    pub props: BTreeMap<String, PropConfig>,
}

fn default_storage_key() -> String {
    constants::storage::DEFAULT_STATE_KEY.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            observers: BTreeSet::new(),
            props: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Add a property (builder style)
    pub fn with_prop(mut self, name: &str, prop: PropConfig) -> Self {
        self.props.insert(name.to_string(), prop);
        self
    }

    /// Enable an external feed (builder style)
    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observers.insert(observer);
        self
    }

    /// Parse a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Parse)
    }

    /// Load a JSON configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }
}
