//! Live appearance preference of the host

use std::cell::Cell;

use crate::config::Appearance;

/// Reports the host's preferred appearance, or `None` if it cannot tell
pub trait PreferenceOracle {
    fn preference(&self) -> Option<Appearance>;
}

impl<F> PreferenceOracle for F
where
    F: Fn() -> Option<Appearance>,
{
    fn preference(&self) -> Option<Appearance> {
        self()
    }
}

/// Oracle answering a settable value
#[derive(Debug, Default)]
pub struct FixedPreference(Cell<Option<Appearance>>);

impl FixedPreference {
    pub fn new(preference: Option<Appearance>) -> Self {
        Self(Cell::new(preference))
    }

    /// Host that cannot report a preference
    pub fn unsupported() -> Self {
        Self::new(None)
    }

    pub fn set(&self, preference: Option<Appearance>) {
        self.0.set(preference);
    }
}

impl PreferenceOracle for FixedPreference {
    fn preference(&self) -> Option<Appearance> {
        self.0.get()
    }
}
