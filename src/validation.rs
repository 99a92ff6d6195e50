//! Validator with its fallback cascade
//!
//! Each handled property is sanitized in order: its own value if allowed,
//! then the fallback value if allowed, then the compiled base. Properties not
//! in the constraints are dropped.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::{Constraint, Constraints};
use crate::state::State;

/// Outcome for a single property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropResult {
    /// Value found in the candidate, if any
    pub supplied: Option<String>,
    pub passed: bool,
}

/// Outcome of validating a candidate state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// Conjunction of every per-property flag
    pub passed: bool,
    /// Exactly one entry per constrained property
    pub values: State,
    pub results: BTreeMap<String, PropResult>,
}

/// Sanitize one value of a constrained property
pub fn sanitize_value<'a>(constraint: &'a Constraint, value: Option<&'a str>, fallback: Option<&'a str>) -> (&'a str, bool) {
    match value {
        Some(value) if constraint.allows(value) => (value, true),
        _ => match fallback {
            Some(fallback) if constraint.allows(fallback) => (fallback, false),
            _ => (constraint.base.as_str(), false),
        },
    }
}

/// Validate a single property; `None` when the property is not handled
pub fn validate_value(constraints: &Constraints, prop: &str, value: Option<&str>, fallback: Option<&str>) -> Option<(String, bool)> {
    let constraint = constraints.get(prop)?;
    let (sanitized, passed) = sanitize_value(constraint, value, fallback);
    Some((sanitized.to_string(), passed))
}

/// Validate a candidate state against the constraints
pub fn validate(constraints: &Constraints, candidate: &State, fallback: Option<&State>) -> Validation {
    let mut values = State::new();
    let mut results = BTreeMap::new();

    for (prop, constraint) in constraints {
        let supplied = candidate.get(prop).map(String::as_str);
        let fallback_value = fallback.and_then(|fallback| fallback.get(prop)).map(String::as_str);
        let (sanitized, passed) = sanitize_value(constraint, supplied, fallback_value);

        if let Some(supplied) = supplied
            && !passed
        {
            warn!(prop = %prop, value = %supplied, sanitized = %sanitized, "Rejected property value");
        }

        values.insert(prop.clone(), sanitized.to_string());
        results.insert(
            prop.clone(),
            PropResult {
                supplied: supplied.map(str::to_string),
                passed,
            },
        );
    }

    for prop in candidate.keys().filter(|prop| !constraints.contains_key(*prop)) {
        debug!(prop = %prop, "Dropping unhandled property");
    }

    let passed = results.values().all(|result| result.passed);
    Validation { passed, values, results }
}
