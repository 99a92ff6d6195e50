//! Property state and its persisted text form
//!
//! State is a flat property name to value mapping. The persisted form is a
//! JSON object of string pairs; anything else reads back as empty.

use std::collections::BTreeMap;
use tracing::debug;

/// Property name to value
pub type State = BTreeMap<String, String>;

/// Overlay `values` on `base`: new keys overwrite, unspecified keys keep their value
pub fn merge(base: &State, values: &State) -> State {
    let mut merged = base.clone();
    for (prop, value) in values {
        merged.insert(prop.clone(), value.clone());
    }
    merged
}

/// Single-property state
pub fn single(prop: &str, value: &str) -> State {
    State::from([(prop.to_string(), value.to_string())])
}

/// Parse persisted text, treating malformed or non-object content as empty
///
/// Non-string members are skipped; valid members of a partially usable
/// object are kept.
pub fn from_json(json: Option<&str>) -> State {
    let Some(json) = json.filter(|json| !json.trim().is_empty()) else {
        return State::new();
    };

    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(serde_json::Value::Object(map)) => map
            .into_iter()
            .filter_map(|(prop, value)| match value {
                serde_json::Value::String(value) => Some((prop, value)),
                _ => None,
            })
            .collect(),
        Ok(_) => {
            debug!("Persisted state is not a JSON object, treating as empty");
            State::new()
        }
        Err(e) => {
            debug!(error = %e, "Persisted state is not valid JSON, treating as empty");
            State::new()
        }
    }
}

/// Serialize state to its persisted text
pub fn to_json(state: &State) -> String {
    // A map of strings always serializes
    serde_json::to_string(state).unwrap_or_else(|_| String::from("{}"))
}
