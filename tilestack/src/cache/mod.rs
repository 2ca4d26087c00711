//! Per-tile raster cache.
//!
//! The cache bridges the compressed band files of the source products and
//! fast random access during synthesis. Each tile owns one container with
//! two namespaces:
//!
//! - [`CacheLevel::RawInput`] - the bands of the time-step being processed
//! - [`CacheLevel::Aggregate`] - the running composite
//!
//! Datasets are replaced in place, never duplicated, and an absent dataset
//! simply means "no data yet".

mod error;
mod store;
mod tile_cache;

pub use error::CacheError;
pub use store::BandStore;
pub use tile_cache::{StageReport, TileCache, CACHE_DIR_NAME};

use std::fmt;

/// Namespace of a cached dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheLevel {
    /// Bands of the time-step currently being aggregated.
    RawInput,
    /// The running composite.
    Aggregate,
}

impl CacheLevel {
    /// Sub-directory holding this namespace.
    pub fn dir_name(self) -> &'static str {
        match self {
            CacheLevel::RawInput => "raw",
            CacheLevel::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for CacheLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}
