//! Structural pre-flight check for a granule.
//!
//! A granule that fails the check is skipped with a warning; it never stops
//! the run.

use std::fmt;
use std::path::PathBuf;

use super::Granule;
use crate::band::{Band, Resolution};

/// Why a granule cannot be aggregated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    /// The reference band is missing from the band directory.
    MissingReferenceBand { dir: PathBuf },
    /// Aerosol thickness is required by the compositing preference but absent.
    MissingAerosolBand { dir: PathBuf },
    /// No scene classification map in any of its possible locations.
    MissingClassification { searched: Vec<PathBuf> },
    /// The tile metadata file is missing.
    MissingTileMetadata { dir: PathBuf },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::MissingReferenceBand { dir } => {
                write!(f, "reference band {} missing in {}", Band::REFERENCE, dir.display())
            }
            Inconsistency::MissingAerosolBand { dir } => {
                write!(f, "aerosol optical thickness missing in {}", dir.display())
            }
            Inconsistency::MissingClassification { searched } => {
                let dirs: Vec<String> = searched.iter().map(|d| d.display().to_string()).collect();
                write!(f, "scene classification missing in {}", dirs.join(" and "))
            }
            Inconsistency::MissingTileMetadata { dir } => {
                write!(f, "tile metadata missing in {}", dir.display())
            }
        }
    }
}

/// Check that `granule` carries everything a pass at `resolution` needs.
///
/// # Arguments
///
/// * `granule` - Granule to check
/// * `resolution` - Resolution of the run
/// * `requires_aerosol` - Whether the compositing preference needs aerosol
///   optical thickness
/// * `extension` - Band file extension of the codec in use
pub fn check_granule(
    granule: &Granule,
    resolution: Resolution,
    requires_aerosol: bool,
    extension: &str,
) -> Result<(), Inconsistency> {
    if granule.locate(Band::REFERENCE, resolution, extension).is_none() {
        return Err(Inconsistency::MissingReferenceBand {
            dir: granule.band_dir(resolution),
        });
    }

    let quality_resolution = resolution.quality_source();
    if requires_aerosol && granule.locate(Band::AOT, quality_resolution, extension).is_none() {
        return Err(Inconsistency::MissingAerosolBand {
            dir: granule.band_dir(quality_resolution),
        });
    }

    if !resolution.is_finest() && granule.locate(Band::SCL, resolution, extension).is_none() {
        return Err(Inconsistency::MissingClassification {
            searched: granule.dirs_for(Band::SCL, resolution),
        });
    }

    if granule.tile_metadata().is_none() {
        return Err(Inconsistency::MissingTileMetadata {
            dir: granule.path().to_path_buf(),
        });
    }

    Ok(())
}
