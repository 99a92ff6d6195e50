//! Application-wide constants
//!
//! Default keys, attribute names and appearance tokens shared by the
//! storage and presentation sides, kept in one place so both agree.

/// Persisted representation defaults
pub mod storage {
    /// Key of the primary entry holding the JSON state object
    pub const DEFAULT_STATE_KEY: &str = "theme-sync";

    /// Key of the dedicated entry holding the raw mode value
    pub const DEFAULT_MODE_KEY: &str = "theme";

    /// Directory (under the user config dir) used by the file store
    pub const APP_DIR: &str = "theme-sync";

    /// File name of the file store
    pub const FILENAME: &str = "storage.json";
}

/// Presentation target naming
pub mod presentation {
    /// Prefix of the attribute written for each property (`data-mode`)
    pub const ATTRIBUTE_PREFIX: &str = "data-";

    /// Attribute name reported for style-channel mutations
    pub const STYLE_ATTRIBUTE: &str = "style";

    /// Attribute name reported for class-channel mutations
    pub const CLASS_ATTRIBUTE: &str = "class";
}

/// Default strategy key names
pub mod keys {
    pub const LIGHT: &str = "light";
    pub const DARK: &str = "dark";
    pub const SYSTEM: &str = "system";
}
