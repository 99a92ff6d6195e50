//! Configuration compiler
//!
//! Runs once at construction and produces the immutable structures every
//! other component reads: per-property [`Constraints`] and, when a property
//! carries the mode role, its [`ModeHandling`].

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::{Appearance, Config, Observer, PropKind, Selector, Strategy};
use crate::constants;
use crate::error::ConfigError;

/// Allowed values and default of one property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub base: String,
    pub allowed: BTreeSet<String>,
}

impl Constraint {
    pub fn allows(&self, value: &str) -> bool {
        self.allowed.contains(value)
    }
}

pub type Constraints = BTreeMap<String, Constraint>;

/// Live-preference resolution of the `system` strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemResolution {
    /// Pseudo-value that triggers a preference query
    pub value: String,
    /// Value whose appearance is used when the oracle is unsupported
    pub fallback: String,
}

/// Mode-resolution metadata of the mode property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeHandling {
    pub prop: String,
    pub resolved_modes: BTreeMap<String, Appearance>,
    pub system: Option<SystemResolution>,
    pub selectors: BTreeSet<Selector>,
    /// Persist the raw mode value under `storage_key` as well
    pub store: bool,
    pub storage_key: String,
}

impl ModeHandling {
    /// Appearance of a concrete (non-pseudo) mode value
    pub fn appearance_of(&self, value: &str) -> Option<Appearance> {
        self.resolved_modes.get(value).copied()
    }

    pub fn is_system_value(&self, value: &str) -> bool {
        self.system.as_ref().is_some_and(|system| system.value == value)
    }
}

/// Everything derived from a [`Config`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
    pub storage_key: String,
    pub observers: BTreeSet<Observer>,
    pub constraints: Constraints,
    pub mode: Option<ModeHandling>,
}

impl Compiled {
    pub fn observes(&self, observer: Observer) -> bool {
        self.observers.contains(&observer)
    }
}

/// Compile a configuration into constraints and mode handling
pub fn compile(config: &Config) -> Result<Compiled, ConfigError> {
    let mut constraints = Constraints::new();
    let mut mode: Option<ModeHandling> = None;

    for (prop, prop_config) in &config.props {
        let strategy = &prop_config.strategy;
        let allowed: BTreeSet<String> = strategy.allowed().into_iter().collect();
        let base = strategy.base().to_string();

        if !allowed.contains(&base) {
            return Err(ConfigError::BaseNotAllowed {
                prop: prop.clone(),
                base,
            });
        }

        if prop_config.kind == PropKind::Mode {
            if let Some(existing) = &mode {
                return Err(ConfigError::MultipleModeProps {
                    first: existing.prop.clone(),
                    second: prop.clone(),
                });
            }
            mode = Some(compile_mode(prop, prop_config, &allowed)?);
        }

        debug!(prop = %prop, base = %base, allowed = allowed.len(), "Compiled property constraints");
        constraints.insert(prop.clone(), Constraint { base, allowed });
    }

    Ok(Compiled {
        storage_key: config.storage_key.clone(),
        observers: config.observers.clone(),
        constraints,
        mode,
    })
}

fn compile_mode(
    prop: &str,
    prop_config: &super::PropConfig,
    allowed: &BTreeSet<String>,
) -> Result<ModeHandling, ConfigError> {
    let strategy = &prop_config.strategy;
    let resolved_modes = strategy.appearances();

    let system = match strategy {
        Strategy::System { fallback, custom_keys, .. } => {
            if !resolved_modes.contains_key(fallback) {
                return Err(ConfigError::InvalidSystemFallback {
                    prop: prop.to_string(),
                    fallback: fallback.clone(),
                });
            }
            Some(SystemResolution {
                value: custom_keys.system().to_string(),
                fallback: fallback.clone(),
            })
        }
        _ => None,
    };

    // Every allowed value must resolve, either directly or through the oracle
    for value in allowed {
        let is_pseudo = system.as_ref().is_some_and(|system| &system.value == value);
        if !is_pseudo && !resolved_modes.contains_key(value) {
            return Err(ConfigError::MissingAppearance {
                prop: prop.to_string(),
                value: value.clone(),
            });
        }
    }

    Ok(ModeHandling {
        prop: prop.to_string(),
        resolved_modes,
        system,
        selectors: prop_config.selectors.iter().copied().collect(),
        store: prop_config.store,
        storage_key: prop_config
            .storage_key
            .clone()
            .unwrap_or_else(|| constants::storage::DEFAULT_MODE_KEY.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CustomKeys, MultiKeys, PropConfig};

    fn system_config() -> Config {
        Config::default().with_prop(
            "mode",
            PropConfig::mode(Strategy::system("system", "light"), &[Selector::ColorScheme, Selector::Class]),
        )
    }

    #[test]
    fn test_empty_config_compiles() {
        let compiled = compile(&Config::default()).unwrap();
        assert!(compiled.constraints.is_empty());
        assert!(compiled.mode.is_none());
        assert_eq!(compiled.storage_key, constants::storage::DEFAULT_STATE_KEY);
    }

    #[test]
    fn test_constraints_per_strategy() {
        let config = Config::default()
            .with_prop("brand", PropConfig::generic(Strategy::mono("acme")))
            .with_prop("radius", PropConfig::generic(Strategy::multi(["sm", "md", "lg"], "md")))
            .with_prop("contrast", PropConfig::generic(Strategy::light_dark("dark")));

        let compiled = compile(&config).unwrap();
        let brand = &compiled.constraints["brand"];
        assert_eq!(brand.base, "acme");
        assert!(brand.allows("acme"));
        assert_eq!(brand.allowed.len(), 1);

        let radius = &compiled.constraints["radius"];
        assert_eq!(radius.base, "md");
        assert!(radius.allows("lg"));
        assert!(!radius.allows("xl"));

        let contrast = &compiled.constraints["contrast"];
        assert!(contrast.allows("light") && contrast.allows("dark"));
        assert!(!contrast.allows("system"));
        assert!(compiled.mode.is_none());
    }

    #[test]
    fn test_mode_handling_system() {
        let compiled = compile(&system_config().with_observer(Observer::Storage)).unwrap();
        let mode = compiled.mode.clone().unwrap();
        assert_eq!(mode.prop, "mode");
        assert_eq!(mode.appearance_of("light"), Some(Appearance::Light));
        assert_eq!(mode.appearance_of("dark"), Some(Appearance::Dark));
        assert_eq!(mode.appearance_of("system"), None);
        assert_eq!(
            mode.system,
            Some(SystemResolution {
                value: "system".to_string(),
                fallback: "light".to_string()
            })
        );
        assert!(mode.is_system_value("system"));
        assert!(mode.selectors.contains(&Selector::Class));
        assert!(!mode.store);
        assert_eq!(mode.storage_key, constants::storage::DEFAULT_MODE_KEY);
        assert!(compiled.observes(Observer::Storage));
        assert!(!compiled.observes(Observer::Attributes));
    }

    #[test]
    fn test_light_dark_mode_has_no_system() {
        let config = Config::default().with_prop(
            "mode",
            PropConfig::mode(Strategy::light_dark("light"), &[Selector::Class]).persisted(Some("scheme")),
        );
        let mode = compile(&config).unwrap().mode.unwrap();
        assert!(mode.system.is_none());
        assert!(mode.store);
        assert_eq!(mode.storage_key, "scheme");
    }

    #[test]
    fn test_custom_system_key() {
        let strategy = Strategy::System {
            base: "auto".to_string(),
            fallback: "dim".to_string(),
            custom_keys: CustomKeys {
                system: Some("auto".to_string()),
                custom: BTreeMap::from([("dim".to_string(), Appearance::Dark)]),
                ..CustomKeys::default()
            },
        };
        let config = Config::default().with_prop("mode", PropConfig::mode(strategy, &[]));
        let compiled = compile(&config).unwrap();

        assert!(compiled.constraints["mode"].allows("auto"));
        assert!(!compiled.constraints["mode"].allows("system"));
        let mode = compiled.mode.unwrap();
        assert!(mode.is_system_value("auto"));
        assert_eq!(mode.appearance_of("dim"), Some(Appearance::Dark));
    }

    #[test]
    fn test_reject_two_mode_props() {
        let config = system_config().with_prop("other", PropConfig::mode(Strategy::light_dark("dark"), &[]));
        assert!(matches!(compile(&config), Err(ConfigError::MultipleModeProps { .. })));
    }

    #[test]
    fn test_reject_base_not_allowed() {
        let config = Config::default().with_prop("radius", PropConfig::generic(Strategy::multi(["sm", "md"], "xl")));
        assert!(matches!(compile(&config), Err(ConfigError::BaseNotAllowed { .. })));
    }

    #[test]
    fn test_reject_system_fallback_to_pseudo_value() {
        let config = Config::default().with_prop("mode", PropConfig::mode(Strategy::system("light", "system"), &[]));
        assert!(matches!(compile(&config), Err(ConfigError::InvalidSystemFallback { .. })));
    }

    #[test]
    fn test_reject_mode_without_appearances() {
        let strategy = Strategy::Multi {
            keys: MultiKeys::List(vec!["a".to_string(), "b".to_string()]),
            base: "a".to_string(),
        };
        let config = Config::default().with_prop("mode", PropConfig::mode(strategy, &[]));
        assert!(matches!(compile(&config), Err(ConfigError::MissingAppearance { .. })));
    }
}
