//! Per-tile statistics, quality indicators and the termination policy.

mod histogram;
mod oracle;
mod quality;
mod store;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use histogram::ClassificationHistogram;
pub use oracle::{TerminationOracle, TerminationReason};
pub use quality::{ClassShare, QualityIndicators};
pub use store::{BestValueRecord, StatsRow, StatsStore, STATS_FILE_NAME};

/// Statistics store errors.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("statistics store not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read statistics {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write statistics {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("malformed statistics {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },
}
