//! Top-level engine error.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::cache::CacheError;
use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::ledger::LedgerError;
use crate::metadata::MetadataError;
use crate::product::ProductError;
use crate::progress::ProgressError;
use crate::stats::StatsError;
use crate::synthesis::SynthesisError;
use crate::target::TargetError;

/// Any failure that ends an engine run.
///
/// Structural problems of single tiles are not errors; they are logged and
/// the tile is skipped.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("source product error: {0}")]
    Product(#[from] ProductError),

    #[error("tile cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("statistics error: {0}")]
    Stats(#[from] StatsError),

    #[error("progress error: {0}")]
    Progress(#[from] ProgressError),

    #[error("synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("target product error: {0}")]
    Target(#[from] TargetError),

    #[error("failed to write report {}: {source}", .path.display())]
    Report { path: PathBuf, source: io::Error },
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
