//! Compressed raster codec contract.
//!
//! The engine never compresses pixels itself. It hands rasters to a
//! [`RasterCodec`] and keeps track of the one thing a plain re-encode loses:
//! the georeferencing block embedded in the source files.
//!
//! # Export flow
//!
//! ```text
//! Raster ──encode──► file (no georef) ──splice_georef──► file_geo ──rename──► file
//! ```

mod error;
mod png;

pub use error::CodecError;
pub use png::{PngCodec, GEOREF_CHUNK};

use std::path::Path;

use crate::band::Resolution;
use crate::raster::Raster;

/// Opaque georeferencing block carried inside encoded band files.
///
/// The engine never interprets the bytes; it only guarantees that the block
/// captured from a tile's first imported band is written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoRefBlock(Vec<u8>);

impl GeoRefBlock {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Result of decoding one band file.
#[derive(Debug, Clone)]
pub struct DecodedBand {
    pub raster: Raster,
    pub georef: Option<GeoRefBlock>,
}

/// Compression effort used when encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevel {
    Fast,
    Default,
    Best,
}

/// Row prediction filter used when encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    None,
    Paeth,
    Adaptive,
}

/// Resolution-tuned encoder parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeProfile {
    pub compression: CompressionLevel,
    pub filter: RowFilter,
}

impl EncodeProfile {
    /// Parameters for rasters of the given resolution.
    ///
    /// Coarse rasters are small, so they get the most compression effort;
    /// 10 m rasters are large enough that encode time dominates.
    pub fn for_resolution(resolution: Resolution) -> Self {
        match resolution {
            Resolution::R60 => Self {
                compression: CompressionLevel::Best,
                filter: RowFilter::Adaptive,
            },
            Resolution::R20 => Self {
                compression: CompressionLevel::Default,
                filter: RowFilter::Adaptive,
            },
            Resolution::R10 => Self {
                compression: CompressionLevel::Fast,
                filter: RowFilter::Paeth,
            },
        }
    }
}

/// A compressed per-band raster codec.
pub trait RasterCodec: Send + Sync {
    /// File extension (without the dot) of the files this codec handles.
    fn extension(&self) -> &str;

    /// Decode a band file into a raster and its georeferencing block.
    fn decode(&self, path: &Path) -> Result<DecodedBand, CodecError>;

    /// Encode a raster into `dest`. The georeferencing block is not written.
    fn encode(&self, raster: &Raster, profile: &EncodeProfile, dest: &Path)
        -> Result<(), CodecError>;

    /// Read only the georeferencing block of an encoded file.
    fn read_georef(&self, path: &Path) -> Result<Option<GeoRefBlock>, CodecError>;

    /// Re-attach a georeferencing block to an encoded file, replacing any
    /// block already present.
    fn splice_georef(&self, path: &Path, block: &GeoRefBlock) -> Result<(), CodecError>;
}
