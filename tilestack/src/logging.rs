//! Logging setup.
//!
//! Every run logs to the console and to a per-run file
//! `tilestack_<YYYYmmddTHHMMSS>.log` in the configured log directory. The
//! level comes from configuration; `RUST_LOG` overrides it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Logging setup errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("invalid log level {level:?}: {reason}")]
    InvalidLevel { level: String, reason: String },

    #[error("logging already initialised: {0}")]
    AlreadyInitialised(String),
}

/// Keeps the file writer alive; dropping it flushes pending lines.
pub struct LoggingGuard {
    _worker: WorkerGuard,
    log_file: PathBuf,
}

impl LoggingGuard {
    /// File this run logs into.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

/// `tilestack_20170705T101032.log`
pub fn log_file_name(at: &DateTime<Local>) -> String {
    format!("tilestack_{}.log", at.format("%Y%m%dT%H%M%S"))
}

/// Install the console and file layers.
///
/// # Arguments
///
/// * `log_dir` - Directory receiving the run log
/// * `level` - Default filter directive, e.g. `info` or `tilestack=debug`
///
/// # Errors
///
/// Fails if the directory cannot be created, the level does not parse, or
/// a global subscriber is already installed.
pub fn init_logging(log_dir: &Path, level: &str) -> Result<LoggingGuard, LoggingError> {
    fs::create_dir_all(log_dir).map_err(|source| LoggingError::CreateDir {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let file_name = log_file_name(&Local::now());
    let appender = tracing_appender::rolling::never(log_dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidLevel {
            level: level.to_string(),
            reason: e.to_string(),
        })?,
    };

    // The local offset cannot be determined in every environment.
    let timer = OffsetTime::local_rfc_3339().unwrap_or_else(|_| OffsetTime::new(UtcOffset::UTC, Rfc3339));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_timer(timer.clone())
                .with_writer(io::stderr),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(writer),
        )
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialised(e.to_string()))?;

    Ok(LoggingGuard {
        _worker: guard,
        log_file: log_dir.join(file_name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_file_name() {
        let at = Local.with_ymd_and_hms(2017, 7, 5, 10, 10, 32).unwrap();
        assert_eq!(log_file_name(&at), "tilestack_20170705T101032.log");
    }
}
