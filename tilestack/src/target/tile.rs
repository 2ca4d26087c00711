use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{io_error, TargetError};
use crate::band::{Band, Resolution};
use crate::cache::CACHE_DIR_NAME;
use crate::product::Granule;

/// Name prefix of aggregate tile directories.
pub const AGGREGATE_TILE_PREFIX: &str = "L03_";

/// Name of the tile metadata copy inside an aggregate tile.
const TILE_METADATA_FILE: &str = "MTD_TL.xml";

/// One footprint's composite inside the target product:
/// `GRANULE/L03_<footprint>_<orbit>_<sensing>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateTile {
    path: PathBuf,
    name: String,
    footprint: String,
    sensing: String,
}

impl AggregateTile {
    /// Recognise an existing aggregate tile directory.
    pub fn from_dir(path: PathBuf) -> Option<Self> {
        if !path.is_dir() {
            return None;
        }
        let name = path.file_name()?.to_str()?.to_string();
        let mut fields = name.strip_prefix(AGGREGATE_TILE_PREFIX)?.split('_');
        let footprint = fields.next()?.to_string();
        let _orbit = fields.next()?;
        let sensing = fields.next()?.to_string();
        Some(Self {
            path,
            name,
            footprint,
            sensing,
        })
    }

    /// Create the aggregate tile for `granule` under `granule_dir`.
    ///
    /// The first granule of a footprint names the tile; its tile metadata is
    /// copied as `MTD_TL.xml`.
    pub fn create(granule_dir: &Path, granule: &Granule) -> Result<Self, TargetError> {
        let tile = granule.tile();
        let name = format!(
            "{}{}_{}_{}",
            AGGREGATE_TILE_PREFIX,
            tile.footprint,
            tile.orbit,
            granule.sensing()
        );
        let path = granule_dir.join(&name);
        let qi_data = path.join("QI_DATA");
        fs::create_dir_all(&qi_data).map_err(io_error(&qi_data))?;

        match granule.tile_metadata() {
            Some(metadata) => {
                fs::copy(&metadata, path.join(TILE_METADATA_FILE)).map_err(io_error(&metadata))?;
            }
            None => warn!(granule = %granule.name(), "No tile metadata to copy"),
        }

        info!(tile = %name, "Aggregate tile created");
        Ok(Self {
            path,
            name,
            footprint: tile.footprint.clone(),
            sensing: granule.sensing().to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn footprint(&self) -> &str {
        &self.footprint
    }

    /// Sensing time of the granule that created the tile.
    pub fn sensing(&self) -> &str {
        &self.sensing
    }

    pub fn qi_data_dir(&self) -> PathBuf {
        self.path.join("QI_DATA")
    }

    pub fn band_dir(&self, resolution: Resolution) -> PathBuf {
        self.path.join("IMG_DATA").join(resolution.dir_name())
    }

    /// Cache container of this tile at `resolution`.
    pub fn cache_dir(&self, resolution: Resolution) -> PathBuf {
        self.band_dir(resolution).join(CACHE_DIR_NAME)
    }

    /// Whether a composite has been cached at `resolution`.
    pub fn has_cache(&self, resolution: Resolution) -> bool {
        self.cache_dir(resolution).is_dir()
    }

    /// Export destination of `band`: `<footprint>_<sensing>_<band>_<res>m.<ext>`
    /// in the band folder, or in `QI_DATA` for the mosaic map.
    pub fn export_path(&self, band: Band, resolution: Resolution, extension: &str) -> PathBuf {
        let file = format!(
            "{}_{}_{}_{}m.{}",
            self.footprint,
            self.sensing,
            band.name(),
            resolution.meters(),
            extension
        );
        if band == Band::MSC {
            self.qi_data_dir().join(file)
        } else {
            self.band_dir(resolution).join(file)
        }
    }
}
