//! Tile cache errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::CacheLevel;
use crate::band::Band;
use crate::codec::CodecError;
use crate::raster::RasterError;

/// Errors raised by the tile cache.
///
/// None of these are recoverable per tile: they mean either the cache
/// infrastructure or the mosaic itself is broken.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to create cache container {}: {source}", .path.display())]
    CreateFailed { path: PathBuf, source: io::Error },

    #[error("cache I/O failed on {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("corrupt cache dataset {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("reference band {band} not found in {}", .dir.display())]
    MissingReferenceBand { band: Band, dir: PathBuf },

    #[error("band {band} is absent from the {level} namespace")]
    BandAbsent { level: CacheLevel, band: Band },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("raster error on band {band}: {source}")]
    Raster { band: Band, source: RasterError },
}
