use crate::error::Result;
use serde::{Deserialize, Serialize};

/// When keys passed to lookups are checked against their canonical key.
///
/// A key is invalid when it names a type that has a registered abstract
/// ancestor; such a type is never used as a storage key, so lookups with it
/// always miss. Checking costs an ancestor walk per lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyValidation {
    /// Check on every lookup
    Always,
    /// Check only in builds with `debug_assertions`
    #[default]
    DebugOnly,
    /// Never check; invalid keys behave as absent keys
    Never,
}

impl KeyValidation {
    pub fn enabled(self) -> bool {
        match self {
            KeyValidation::Always => true,
            KeyValidation::DebugOnly => cfg!(debug_assertions),
            KeyValidation::Never => false,
        }
    }
}

/// Registry configuration
///
/// ```
/// use sovran_ec::{Config, KeyValidation};
///
/// let config = Config::from_toml(r#"key_validation = "always""#)?;
/// assert_eq!(config.key_validation, KeyValidation::Always);
/// # Ok::<(), sovran_ec::ComponentError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub key_validation: KeyValidation,
}

impl Config {
    /// Parse a configuration from a TOML document. Missing fields take their defaults.
    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml_edit::de::from_str(source)?)
    }

    pub fn with_key_validation(mut self, key_validation: KeyValidation) -> Self {
        self.key_validation = key_validation;
        self
    }
}
