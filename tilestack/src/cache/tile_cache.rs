//! Staging, access and export of one tile's bands.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{BandStore, CacheError, CacheLevel};
use crate::band::{Band, Resolution};
use crate::codec::{EncodeProfile, GeoRefBlock, RasterCodec};
use crate::product::Granule;
use crate::raster::{median_filter, resize_bilinear, Raster};

/// Name of the container directory inside an aggregate tile's band folder.
pub const CACHE_DIR_NAME: &str = ".cache";

/// What a staging pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    /// Namespace the bands were staged into.
    pub level: CacheLevel,
    /// `(rows, cols)` of the reference band.
    pub shape: (usize, usize),
    /// Bands imported, in staging order.
    pub imported: Vec<Band>,
    /// Bands that could not be located.
    pub missing: Vec<Band>,
}

impl StageReport {
    /// Whether this pass seeded the composite rather than adding a time-step.
    pub fn seeded(&self) -> bool {
        self.level == CacheLevel::Aggregate
    }
}

/// Cache handle for one tile at one resolution.
///
/// The handle holds no open files; every operation opens and closes what it
/// touches.
pub struct TileCache {
    store: BandStore,
    codec: Arc<dyn RasterCodec>,
    resolution: Resolution,
}

impl TileCache {
    /// Open (or create) the container at `container`.
    ///
    /// # Arguments
    ///
    /// * `container` - Container directory
    /// * `resolution` - Resolution of the run
    /// * `codec` - Codec used for band files
    pub fn open(
        container: impl Into<PathBuf>,
        resolution: Resolution,
        codec: Arc<dyn RasterCodec>,
    ) -> Result<Self, CacheError> {
        Ok(Self {
            store: BandStore::open(container)?,
            codec,
            resolution,
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Container directory.
    pub fn path(&self) -> &Path {
        self.store.root()
    }

    /// Whether the composite has been seeded with a first time-step.
    pub fn is_seeded(&self) -> bool {
        self.store.contains(CacheLevel::Aggregate, Band::REFERENCE)
    }

    /// Stage every band of `granule` needed at this resolution.
    ///
    /// The first time-step of a tile seeds the aggregate namespace directly;
    /// later time-steps go to the raw input namespace, which is cleared
    /// first. At the finest resolution, aerosol thickness and scene
    /// classification are taken from the coarser band folder and upsampled
    /// to the reference band's shape.
    ///
    /// # Errors
    ///
    /// Fails if the reference band cannot be found, or on any codec or cache
    /// I/O failure. Other missing bands are reported, not fatal.
    pub fn stage_input_tile(&self, granule: &Granule) -> Result<StageReport, CacheError> {
        let level = if self.is_seeded() {
            CacheLevel::RawInput
        } else {
            CacheLevel::Aggregate
        };
        if level == CacheLevel::RawInput {
            self.store.clear(CacheLevel::RawInput)?;
        }

        let ext = self.codec.extension().to_string();
        let reference = granule
            .locate(Band::REFERENCE, self.resolution, &ext)
            .ok_or_else(|| CacheError::MissingReferenceBand {
                band: Band::REFERENCE,
                dir: granule.band_dir(self.resolution),
            })?;
        let shape = self.import_band(level, Band::REFERENCE, &reference)?;

        let mut imported = vec![Band::REFERENCE];
        let mut missing = Vec::new();

        for &band in self.resolution.spectral_bands() {
            if band == Band::REFERENCE {
                continue;
            }
            match granule.locate(band, self.resolution, &ext) {
                Some(path) => {
                    self.import_band(level, band, &path)?;
                    imported.push(band);
                }
                None => missing.push(band),
            }
        }

        let quality_resolution = self.resolution.quality_source();
        for band in Band::QUALITY {
            match granule.locate(band, quality_resolution, &ext) {
                Some(path) if quality_resolution != self.resolution => {
                    self.import_band_to_shape(level, band, &path, shape)?;
                    imported.push(band);
                }
                Some(path) => {
                    self.import_band(level, band, &path)?;
                    imported.push(band);
                }
                None => missing.push(band),
            }
        }

        for band in &missing {
            warn!(
                granule = %granule.name(),
                band = %band,
                resolution = self.resolution.meters(),
                "Band not found, dependent processing disabled"
            );
        }
        info!(
            granule = %granule.name(),
            level = %level,
            bands = imported.len(),
            rows = shape.0,
            cols = shape.1,
            "Tile staged"
        );

        Ok(StageReport {
            level,
            shape,
            imported,
            missing,
        })
    }

    /// Decode one band file into the cache, replacing any existing dataset.
    ///
    /// The tile's georeferencing block is captured from the first imported
    /// band that carries one.
    ///
    /// # Returns
    ///
    /// `(rows, cols)` of the imported raster.
    pub fn import_band(
        &self,
        level: CacheLevel,
        band: Band,
        source: &Path,
    ) -> Result<(usize, usize), CacheError> {
        let raster = self.decode(source)?;
        let dims = raster.dims();
        self.store
            .write(level, band, &raster.to_element_type(band.element_type()))?;
        debug!(band = %band, level = %level, source = %source.display(), "Band imported");
        Ok(dims)
    }

    fn import_band_to_shape(
        &self,
        level: CacheLevel,
        band: Band,
        source: &Path,
        (rows, cols): (usize, usize),
    ) -> Result<(), CacheError> {
        let raster = self.decode(source)?;
        let resized = resize_bilinear(&raster, rows, cols)
            .map_err(|source| CacheError::Raster { band, source })?;
        self.store
            .write(level, band, &resized.to_element_type(band.element_type()))?;
        debug!(
            band = %band,
            from_rows = raster.rows(),
            from_cols = raster.cols(),
            rows,
            cols,
            "Band upsampled into cache"
        );
        Ok(())
    }

    fn decode(&self, source: &Path) -> Result<Raster, CacheError> {
        let decoded = self.codec.decode(source)?;
        if let Some(block) = decoded.georef {
            if self.store.read_georef()?.is_none() {
                self.store.write_georef(&block)?;
                debug!(source = %source.display(), "Georeferencing block captured");
            }
        }
        Ok(decoded.raster)
    }

    /// Read a band; `Ok(None)` when it is absent.
    pub fn get_band(&self, level: CacheLevel, band: Band) -> Result<Option<Raster>, CacheError> {
        self.store.read(level, band)
    }

    /// Write a band, replacing any existing dataset.
    pub fn set_band(&self, level: CacheLevel, band: Band, raster: &Raster) -> Result<(), CacheError> {
        self.store.write(level, band, raster)
    }

    /// Delete a band. Returns whether it existed.
    pub fn delete_band(&self, level: CacheLevel, band: Band) -> Result<bool, CacheError> {
        self.store.remove(level, band)
    }

    /// Bands present in a namespace.
    pub fn bands(&self, level: CacheLevel) -> Result<Vec<Band>, CacheError> {
        self.store.bands(level)
    }

    /// The georeferencing block captured for this tile, if any.
    pub fn georef(&self) -> Result<Option<GeoRefBlock>, CacheError> {
        self.store.read_georef()
    }

    /// Encode a cached band to `dest` and re-attach the tile's
    /// georeferencing block.
    ///
    /// # Arguments
    ///
    /// * `level` - Namespace to export from
    /// * `band` - Band to export
    /// * `dest` - Destination file
    /// * `median_size` - Median window edge; 0 or 1 disables smoothing
    pub fn export_band(
        &self,
        level: CacheLevel,
        band: Band,
        dest: &Path,
        median_size: usize,
    ) -> Result<(), CacheError> {
        let raster = self
            .store
            .read(level, band)?
            .ok_or(CacheError::BandAbsent { level, band })?;
        let raster = if median_size > 1 {
            median_filter(&raster, median_size)
        } else {
            raster
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.codec
            .encode(&raster, &EncodeProfile::for_resolution(self.resolution), dest)?;

        match self.store.read_georef()? {
            Some(block) => self.codec.splice_georef(dest, &block)?,
            None => warn!(dest = %dest.display(), "No georeferencing block captured for tile"),
        }
        debug!(band = %band, dest = %dest.display(), "Band exported");
        Ok(())
    }
}
