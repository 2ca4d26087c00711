//! Product metadata collaborator.
//!
//! The engine reports three things to product metadata: the
//! Classification-QI block of each resolution, the aggregate granules the
//! product contains, and which source tiles went into it. How that is
//! serialised is up to the [`MetadataRepository`] implementation.

mod json;

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use json::{JsonMetadataRepository, METADATA_FILE_NAME};

use crate::band::Resolution;
use crate::stats::QualityIndicators;

/// Metadata errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read metadata {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write metadata {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("malformed metadata {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },
}

/// One source tile folded into the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub source_product: String,
    pub granule: String,
    pub resolution: u32,
    pub pass: u32,
    /// Local time of the commit, RFC 3339.
    pub processed_at: String,
    pub engine_version: String,
}

/// Sink for product-level metadata.
pub trait MetadataRepository: Send + Sync {
    /// Replace the Classification-QI block of `resolution`.
    fn write_classification_qi(
        &self,
        resolution: Resolution,
        indicators: &QualityIndicators,
    ) -> Result<(), MetadataError>;

    /// Make sure `granule` is listed at `resolution`. Listing twice is a
    /// no-op.
    fn record_granule(&self, granule: &str, resolution: Resolution) -> Result<(), MetadataError>;

    /// Append a provenance entry.
    fn record_provenance(&self, entry: &ProvenanceEntry) -> Result<(), MetadataError>;
}
