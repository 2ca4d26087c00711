//! PNG band codec.
//!
//! Bands are stored as 8- or 16-bit grayscale PNG. The georeferencing block
//! lives in a private ancillary chunk ([`GEOREF_CHUNK`]) placed directly after
//! `IHDR`. The `image` encoder does not know about that chunk, so it is
//! spliced in at the byte level after encoding.

use std::fs;
use std::path::{Path, PathBuf};

use flate2::Crc;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};
use tracing::debug;

use super::{
    CodecError, CompressionLevel, DecodedBand, EncodeProfile, GeoRefBlock, RasterCodec, RowFilter,
};
use crate::raster::{Raster, RasterData};

/// Chunk type of the georeferencing block: ancillary, private, safe to copy.
pub const GEOREF_CHUNK: [u8; 4] = *b"geOr";

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const IHDR: [u8; 4] = *b"IHDR";

/// PNG implementation of [`RasterCodec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl PngCodec {
    pub fn new() -> Self {
        Self
    }
}

impl RasterCodec for PngCodec {
    fn extension(&self) -> &str {
        "png"
    }

    fn decode(&self, path: &Path) -> Result<DecodedBand, CodecError> {
        let bytes = read_file(path)?;
        let georef = find_chunk(&bytes, &GEOREF_CHUNK)
            .map_err(|reason| malformed(path, reason))?
            .map(|data| GeoRefBlock::new(data.to_vec()));

        let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png).map_err(|e| {
            CodecError::Decode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        let rows = image.height() as usize;
        let cols = image.width() as usize;
        let data = match image {
            DynamicImage::ImageLuma8(buf) => RasterData::U8(buf.into_raw()),
            DynamicImage::ImageLuma16(buf) => RasterData::U16(buf.into_raw()),
            other => {
                return Err(CodecError::Decode {
                    path: path.to_path_buf(),
                    reason: format!("unsupported color type {:?}", other.color()),
                })
            }
        };
        let raster = Raster::new(rows, cols, data).map_err(|e| CodecError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(DecodedBand { raster, georef })
    }

    fn encode(
        &self,
        raster: &Raster,
        profile: &EncodeProfile,
        dest: &Path,
    ) -> Result<(), CodecError> {
        let encode_err = |reason: String| CodecError::Encode {
            path: dest.to_path_buf(),
            reason,
        };
        let width = u32::try_from(raster.cols()).map_err(|e| encode_err(e.to_string()))?;
        let height = u32::try_from(raster.rows()).map_err(|e| encode_err(e.to_string()))?;

        let mut out = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            &mut out,
            compression_type(profile.compression),
            filter_type(profile.filter),
        );
        match raster.data() {
            RasterData::U8(pixels) => {
                encoder.write_image(pixels, width, height, ExtendedColorType::L8)
            }
            RasterData::U16(pixels) => {
                // The encoder expects 16-bit samples in native byte order.
                let bytes: Vec<u8> = pixels.iter().flat_map(|p| p.to_ne_bytes()).collect();
                encoder.write_image(&bytes, width, height, ExtendedColorType::L16)
            }
        }
        .map_err(|e| encode_err(e.to_string()))?;

        fs::write(dest, out).map_err(|source| CodecError::Write {
            path: dest.to_path_buf(),
            source,
        })
    }

    fn read_georef(&self, path: &Path) -> Result<Option<GeoRefBlock>, CodecError> {
        let bytes = read_file(path)?;
        let block = find_chunk(&bytes, &GEOREF_CHUNK).map_err(|reason| malformed(path, reason))?;
        Ok(block.map(|data| GeoRefBlock::new(data.to_vec())))
    }

    fn splice_georef(&self, path: &Path, block: &GeoRefBlock) -> Result<(), CodecError> {
        let bytes = read_file(path)?;
        let chunks = parse_chunks(&bytes).map_err(|reason| malformed(path, reason))?;

        let mut out = Vec::with_capacity(bytes.len() + block.as_bytes().len() + 12);
        out.extend_from_slice(&PNG_SIGNATURE);
        let mut spliced = false;
        for chunk in chunks {
            if chunk.kind == GEOREF_CHUNK {
                continue;
            }
            write_chunk(&mut out, &chunk.kind, chunk.data);
            if chunk.kind == IHDR {
                write_chunk(&mut out, &GEOREF_CHUNK, block.as_bytes());
                spliced = true;
            }
        }
        if !spliced {
            return Err(malformed(path, "missing IHDR chunk".to_string()));
        }

        let staged = geo_path(path);
        fs::write(&staged, &out).map_err(|source| CodecError::Write {
            path: staged.clone(),
            source,
        })?;
        fs::rename(&staged, path).map_err(|source| CodecError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), bytes = block.as_bytes().len(), "Spliced georeferencing block");
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, CodecError> {
    fs::read(path).map_err(|source| CodecError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn malformed(path: &Path, reason: String) -> CodecError {
    CodecError::Malformed {
        path: path.to_path_buf(),
        reason,
    }
}

/// `<stem>_geo.<ext>` next to the original.
fn geo_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_geo.{}", stem, ext.to_string_lossy()),
        None => format!("{}_geo", stem),
    };
    path.with_file_name(name)
}

fn compression_type(level: CompressionLevel) -> CompressionType {
    match level {
        CompressionLevel::Fast => CompressionType::Fast,
        CompressionLevel::Default => CompressionType::Default,
        CompressionLevel::Best => CompressionType::Best,
    }
}

fn filter_type(filter: RowFilter) -> PngFilterType {
    match filter {
        RowFilter::None => PngFilterType::NoFilter,
        RowFilter::Paeth => PngFilterType::Paeth,
        RowFilter::Adaptive => PngFilterType::Adaptive,
    }
}

struct Chunk<'a> {
    kind: [u8; 4],
    data: &'a [u8],
}

/// Split a PNG byte stream into its chunks.
fn parse_chunks(bytes: &[u8]) -> Result<Vec<Chunk<'_>>, String> {
    if bytes.len() < PNG_SIGNATURE.len() || bytes[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
        return Err("missing PNG signature".to_string());
    }
    let mut chunks = Vec::new();
    let mut pos = PNG_SIGNATURE.len();
    while pos < bytes.len() {
        let header = bytes
            .get(pos..pos + 8)
            .ok_or_else(|| format!("truncated chunk header at offset {}", pos))?;
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let kind = [header[4], header[5], header[6], header[7]];
        let data_start = pos + 8;
        let data = bytes
            .get(data_start..data_start + len)
            .ok_or_else(|| format!("truncated chunk data at offset {}", pos))?;
        // data + crc
        pos = data_start + len + 4;
        if pos > bytes.len() {
            return Err(format!("truncated chunk crc at offset {}", data_start + len));
        }
        chunks.push(Chunk { kind, data });
        if kind == *b"IEND" {
            break;
        }
    }
    Ok(chunks)
}

fn find_chunk<'a>(bytes: &'a [u8], kind: &[u8; 4]) -> Result<Option<&'a [u8]>, String> {
    Ok(parse_chunks(bytes)?
        .into_iter()
        .find(|chunk| &chunk.kind == kind)
        .map(|chunk| chunk.data))
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    let mut crc = Crc::new();
    crc.update(kind);
    crc.update(data);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&crc.sum().to_be_bytes());
}
