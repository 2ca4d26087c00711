//! CLI error type.

use std::fmt;

use tilestack::logging::LoggingError;
use tilestack::EngineError;

/// Errors that end the application.
#[derive(Debug)]
pub enum CliError {
    /// Bad command line or configuration.
    Config(String),
    /// Logging could not be set up.
    Logging(LoggingError),
    /// The engine failed.
    Engine(EngineError),
    /// Progress display could not be set up.
    Progress(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "{}", msg),
            CliError::Logging(e) => write!(f, "logging: {}", e),
            CliError::Engine(e) => write!(f, "{}", e),
            CliError::Progress(msg) => write!(f, "progress display: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Logging(e) => Some(e),
            CliError::Engine(e) => Some(e),
            CliError::Config(_) | CliError::Progress(_) => None,
        }
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<tilestack::config::ConfigError> for CliError {
    fn from(e: tilestack::config::ConfigError) -> Self {
        CliError::Engine(EngineError::Config(e))
    }
}
