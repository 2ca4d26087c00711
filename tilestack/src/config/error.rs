//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating configuration.
///
/// All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("missing configuration value [{section}] {key}")]
    Missing { section: String, key: String },

    #[error("invalid value for [{section}] {key}: {value:?} ({reason})")]
    Invalid {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("minimum time {min} is after maximum time {max}")]
    InvertedTimeRange { min: String, max: String },

    #[error("unsupported resolution: {0} m")]
    UnsupportedResolution(u32),

    #[error("directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),
}

impl ConfigError {
    pub(crate) fn invalid(
        section: &str,
        key: &str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::Invalid {
            section: section.to_string(),
            key: key.to_string(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}
