//! Granules (tiles) inside a source product.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::NamingConvention;
use crate::band::{Band, Resolution};

fn footprint_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // UTM zone + latitude band + 100 km square, e.g. T32TQM
    PATTERN.get_or_init(|| Regex::new(r"^T\d{2}[A-Z]{3}$").unwrap())
}

fn orbit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^A\d{6}$").unwrap())
}

/// Identity of a tile: ground footprint plus the orbit it was sensed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub footprint: String,
    pub orbit: String,
}

impl TileId {
    pub fn new(footprint: impl Into<String>, orbit: impl Into<String>) -> Self {
        Self {
            footprint: footprint.into(),
            orbit: orbit.into(),
        }
    }

    /// Parse a granule directory name.
    ///
    /// Returns `None` when the name does not carry a footprint and an orbit at
    /// the positions the convention prescribes.
    pub fn parse(granule_name: &str, convention: NamingConvention) -> Option<Self> {
        let layout = convention.layout();
        let fields: Vec<&str> = granule_name.split('_').collect();
        let footprint = fields.get(layout.footprint_field)?;
        let orbit = fields.get(layout.orbit_field)?;
        if !footprint_pattern().is_match(footprint) || !orbit_pattern().is_match(orbit) {
            return None;
        }
        Some(Self::new(*footprint, *orbit))
    }

    /// Completion key recorded in the ledger: `<footprint>_<orbit>_<res>`.
    pub fn ledger_key(&self, resolution: Resolution) -> String {
        format!("{}_{}_{}", self.footprint, self.orbit, resolution.meters())
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.footprint, self.orbit)
    }
}

/// A granule directory of a source product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Granule {
    path: PathBuf,
    name: String,
    tile: TileId,
    sensing: String,
    convention: NamingConvention,
}

impl Granule {
    /// Build a granule from its directory; `None` if the name is not a
    /// granule name of `convention`.
    pub fn from_dir(path: impl Into<PathBuf>, convention: NamingConvention) -> Option<Self> {
        let path = path.into();
        let name = path.file_name()?.to_str()?.to_string();
        let tile = TileId::parse(&name, convention)?;
        let sensing = name
            .split('_')
            .nth(convention.layout().sensing_field)
            .unwrap_or_default()
            .to_string();
        Some(Self {
            path,
            name,
            tile,
            sensing,
            convention,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tile(&self) -> &TileId {
        &self.tile
    }

    /// Sensing time field of the granule name.
    pub fn sensing(&self) -> &str {
        &self.sensing
    }

    pub fn convention(&self) -> NamingConvention {
        self.convention
    }

    /// `IMG_DATA` directory.
    pub fn img_data_dir(&self) -> PathBuf {
        self.path.join("IMG_DATA")
    }

    /// Band directory for a resolution, e.g. `IMG_DATA/R20m`.
    pub fn band_dir(&self, resolution: Resolution) -> PathBuf {
        self.img_data_dir().join(resolution.dir_name())
    }

    /// Directories a band of this granule may be published in, most likely
    /// first.
    ///
    /// The scene classification map moved between layouts, so both of its
    /// historical locations are searched.
    pub fn dirs_for(&self, band: Band, resolution: Resolution) -> Vec<PathBuf> {
        if band != Band::SCL {
            return vec![self.band_dir(resolution)];
        }
        if self.convention.layout().classification_in_img_data {
            vec![self.img_data_dir(), self.band_dir(resolution)]
        } else {
            vec![self.band_dir(resolution), self.img_data_dir()]
        }
    }

    /// Locate the file of `band` at `resolution`.
    ///
    /// When several files match, the first in name order wins.
    pub fn locate(&self, band: Band, resolution: Resolution, extension: &str) -> Option<PathBuf> {
        let suffix = format!("_{}m.{}", resolution.meters(), extension);
        let mask = self.convention.band_mask(band, extension);

        for dir in self.dirs_for(band, resolution) {
            let pattern = format!("{}/{}", glob::Pattern::escape(&dir.to_string_lossy()), mask);
            let mut matches: Vec<PathBuf> = match glob::glob(&pattern) {
                Ok(paths) => paths
                    .filter_map(Result::ok)
                    .filter(|p| p.is_file() && p.to_string_lossy().ends_with(&suffix))
                    .collect(),
                Err(e) => {
                    debug!(pattern = %pattern, error = %e, "Invalid band pattern");
                    continue;
                }
            };
            matches.sort();
            if let Some(found) = matches.into_iter().next() {
                return Some(found);
            }
        }
        None
    }

    /// Locate the tile metadata file.
    pub fn tile_metadata(&self) -> Option<PathBuf> {
        let pattern = glob::Pattern::new(self.convention.layout().tile_metadata_mask).ok()?;
        let mut found: Vec<PathBuf> = std::fs::read_dir(&self.path)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| pattern.matches(n))
            })
            .collect();
        found.sort();
        found.into_iter().next()
    }
}
