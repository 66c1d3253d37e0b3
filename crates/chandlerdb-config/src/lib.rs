//! Typed view configuration for ChandlerDB.
//!
//! Configuration is read from TOML and validated once at load time. The core
//! crate only ever sees a validated [`ViewConfig`].

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error as ThisError;

///
/// CONSTANTS
///

/// Locale used by string indexes that do not name one.
pub const DEFAULT_LOCALE: &str = "en";

/// View name used when none is configured.
pub const DEFAULT_VIEW_NAME: &str = "main";

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {message}")]
    Io { path: String, message: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

///
/// ViewConfig
///
/// Root configuration document.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewConfig {
    pub view: ViewSection,
    pub index: IndexSection,
}

impl ViewConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;

        Self::from_toml_str(&source)
    }

    /// Render the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.view.name.trim().is_empty() {
            return Err(ConfigError::Invalid("view.name must not be empty".into()));
        }
        if self.index.default_locale.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "index.default_locale must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Queue bound, or `None` when unbounded.
    #[must_use]
    pub const fn notification_limit(&self) -> Option<usize> {
        match self.view.max_queued_notifications {
            0 => None,
            limit => Some(limit),
        }
    }
}

///
/// ViewSection
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewSection {
    pub name: String,

    /// Drain the notification queue when the view commits.
    pub dispatch_on_commit: bool,

    /// Audit every collection's indexes when the view commits.
    pub check_indexes_on_commit: bool,

    /// 0 means unbounded.
    pub max_queued_notifications: usize,
}

impl Default for ViewSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_VIEW_NAME.to_string(),
            dispatch_on_commit: true,
            check_indexes_on_commit: false,
            max_queued_notifications: 0,
        }
    }
}

///
/// IndexSection
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexSection {
    pub default_locale: String,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            default_locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

///
/// TESTS
///
