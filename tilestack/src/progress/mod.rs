//! Run progress and per-tile duration baselines.
//!
//! Both files live in the log directory so an external monitor can poll
//! them while a run is in flight:
//!
//! - `.progress`: a single percentage, rewritten after every tile
//! - `.estimation`: per-resolution seconds-per-tile baselines (INI)

mod estimation;
mod tracker;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use estimation::{TimeEstimates, ESTIMATION_FILE_NAME};
pub use tracker::{displayed_percentage, ProgressTracker, PROGRESS_FILE_NAME};

/// Progress and estimation file errors.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to read {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },
}
