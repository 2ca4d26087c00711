//! On-disk band container.
//!
//! One container directory per tile and resolution:
//!
//! ```text
//! .cache/
//! ├── georef.bin          captured georeferencing block
//! ├── raw/                raw input namespace
//! │   ├── B02.band
//! │   └── SCL.band
//! └── aggregate/          aggregate namespace
//!     └── B02.band
//! ```
//!
//! A dataset file is a bincode header followed by a zlib-compressed,
//! little-endian pixel payload. A write deletes the existing dataset, then
//! writes a temp file and renames it into place. A process killed between
//! the delete and the rename leaves the band absent, which reads as no data;
//! a partially written temp file is never read.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use super::{CacheError, CacheLevel};
use crate::band::Band;
use crate::codec::GeoRefBlock;
use crate::raster::{ElementType, Raster, RasterData};

const DATASET_EXTENSION: &str = "band";
const GEOREF_FILE: &str = "georef.bin";
const DATASET_MAGIC: [u8; 4] = *b"TSB1";
const COMPRESSION_LEVEL: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct DatasetHeader {
    magic: [u8; 4],
    element_type: ElementType,
    rows: u64,
    cols: u64,
}

/// Directory-backed store of named band datasets in two namespaces.
#[derive(Debug, Clone)]
pub struct BandStore {
    root: PathBuf,
}

impl BandStore {
    /// Open a container, creating it and both namespaces if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        for level in [CacheLevel::RawInput, CacheLevel::Aggregate] {
            let dir = root.join(level.dir_name());
            fs::create_dir_all(&dir).map_err(|source| CacheError::CreateFailed {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dataset_path(&self, level: CacheLevel, band: Band) -> PathBuf {
        self.root
            .join(level.dir_name())
            .join(format!("{}.{}", band.name(), DATASET_EXTENSION))
    }

    /// Whether a dataset exists.
    pub fn contains(&self, level: CacheLevel, band: Band) -> bool {
        self.dataset_path(level, band).is_file()
    }

    /// Read a dataset; `None` when it does not exist.
    pub fn read(&self, level: CacheLevel, band: Band) -> Result<Option<Raster>, CacheError> {
        let path = self.dataset_path(level, band);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        let mut reader = BufReader::new(file);

        let corrupt = |reason: String| CacheError::Corrupt {
            path: path.clone(),
            reason,
        };
        let header: DatasetHeader =
            bincode::deserialize_from(&mut reader).map_err(|e| corrupt(e.to_string()))?;
        if header.magic != DATASET_MAGIC {
            return Err(corrupt("bad magic".to_string()));
        }

        let mut payload = Vec::new();
        ZlibDecoder::new(reader)
            .read_to_end(&mut payload)
            .map_err(|e| corrupt(e.to_string()))?;

        let rows = header.rows as usize;
        let cols = header.cols as usize;
        let data = match header.element_type {
            ElementType::U8 => RasterData::U8(payload),
            ElementType::U16 => {
                if payload.len() % 2 != 0 {
                    return Err(corrupt("odd payload length for 16-bit data".to_string()));
                }
                RasterData::U16(
                    payload
                        .chunks_exact(2)
                        .map(|b| u16::from_le_bytes([b[0], b[1]]))
                        .collect(),
                )
            }
        };
        Raster::new(rows, cols, data)
            .map(Some)
            .map_err(|e| corrupt(e.to_string()))
    }

    /// Write a dataset, replacing any existing one.
    pub fn write(&self, level: CacheLevel, band: Band, raster: &Raster) -> Result<(), CacheError> {
        let path = self.dataset_path(level, band);
        self.remove(level, band)?;

        let header = DatasetHeader {
            magic: DATASET_MAGIC,
            element_type: raster.element_type(),
            rows: raster.rows() as u64,
            cols: raster.cols() as u64,
        };
        let payload: Vec<u8> = match raster.data() {
            RasterData::U8(pixels) => pixels.clone(),
            RasterData::U16(pixels) => pixels.iter().flat_map(|p| p.to_le_bytes()).collect(),
        };

        let temp_path = path.with_extension("tmp");
        let io_err = |source: std::io::Error| CacheError::Io {
            path: temp_path.clone(),
            source,
        };
        let file = File::create(&temp_path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, &header).map_err(|e| CacheError::Corrupt {
            path: temp_path.clone(),
            reason: e.to_string(),
        })?;
        let mut encoder = ZlibEncoder::new(writer, Compression::new(COMPRESSION_LEVEL));
        encoder.write_all(&payload).map_err(io_err)?;
        let mut writer = encoder.finish().map_err(io_err)?;
        writer.flush().map_err(io_err)?;
        drop(writer);

        fs::rename(&temp_path, &path).map_err(|source| CacheError::Io { path, source })
    }

    /// Remove a dataset. Returns whether one existed.
    pub fn remove(&self, level: CacheLevel, band: Band) -> Result<bool, CacheError> {
        let path = self.dataset_path(level, band);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Remove every dataset in a namespace.
    pub fn clear(&self, level: CacheLevel) -> Result<(), CacheError> {
        for band in self.bands(level)? {
            self.remove(level, band)?;
        }
        Ok(())
    }

    /// Bands present in a namespace, sorted.
    pub fn bands(&self, level: CacheLevel) -> Result<Vec<Band>, CacheError> {
        let dir = self.root.join(level.dir_name());
        let entries = fs::read_dir(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut bands = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CacheError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DATASET_EXTENSION) {
                continue;
            }
            if let Some(band) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<Band>().ok())
            {
                bands.push(band);
            }
        }
        bands.sort();
        Ok(bands)
    }

    /// The captured georeferencing block, if any.
    pub fn read_georef(&self) -> Result<Option<GeoRefBlock>, CacheError> {
        let path = self.root.join(GEOREF_FILE);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(GeoRefBlock::new(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Persist the georeferencing block.
    pub fn write_georef(&self, block: &GeoRefBlock) -> Result<(), CacheError> {
        let path = self.root.join(GEOREF_FILE);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, block.as_bytes()).map_err(|source| CacheError::Io {
            path: temp_path.clone(),
            source,
        })?;
        fs::rename(&temp_path, &path).map_err(|source| CacheError::Io { path, source })
    }
}
