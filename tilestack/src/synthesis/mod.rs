//! Synthesis collaborator.
//!
//! Synthesis folds the time-step staged in a tile's raw input namespace into
//! the running composite held in its aggregate namespace, and reports the
//! classification histogram of the resulting composite. The engine treats it
//! as opaque: it stages, calls [`Synthesis::synthesize`] once per tile and
//! records the returned histogram.
//!
//! # Implementors
//!
//! - [`MostRecentSynthesis`] - newest valid observation wins

mod most_recent;

use thiserror::Error;

pub use most_recent::MostRecentSynthesis;

use crate::band::Band;
use crate::cache::{CacheError, CacheLevel, StageReport, TileCache};
use crate::config::{
    Algorithm, Classifiers, EngineConfig, RadiometricPreference, Thresholds,
};
use crate::product::TileId;
use crate::raster::RasterError;
use crate::stats::{ClassificationHistogram, StatsError, StatsStore};

/// Synthesis failures. Always fatal: a half-written composite cannot be
/// trusted.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error("band {band} is missing from the {level} namespace")]
    MissingBand { level: CacheLevel, band: Band },

    #[error(
        "band {band} has shape {}x{}, composite is {}x{}",
        .found.0, .found.1, .expected.0, .expected.1
    )]
    ShapeMismatch {
        band: Band,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("raster error on band {band}: {source}")]
    Raster { band: Band, source: RasterError },

    #[error("algorithm {0} is not available")]
    Unsupported(Algorithm),
}

/// Compositing settings handed to synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisParams {
    pub algorithm: Algorithm,
    pub radiometric_preference: RadiometricPreference,
    pub cirrus_removal: bool,
    pub shadow_removal: bool,
    pub snow_removal: bool,
    pub thresholds: Thresholds,
    pub classifiers: Classifiers,
}

impl SynthesisParams {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            algorithm: config.algorithm,
            radiometric_preference: config.radiometric_preference,
            cirrus_removal: config.cirrus_removal,
            shadow_removal: config.shadow_removal,
            snow_removal: config.snow_removal,
            thresholds: config.thresholds,
            classifiers: config.classifiers,
        }
    }
}

/// The time-step being folded into a tile's composite.
#[derive(Debug, Clone, Copy)]
pub struct TimeStep<'a> {
    pub tile: &'a TileId,
    /// 1-based pass number of this tile at this resolution.
    pub pass: u32,
    pub stage: &'a StageReport,
    /// Store holding the best-value record.
    pub stats: &'a StatsStore,
}

/// Folds one staged time-step into the composite.
pub trait Synthesis: Send + Sync {
    /// Update the aggregate namespace of `cache` from the staged time-step.
    ///
    /// # Returns
    ///
    /// Classification histogram of the whole composite after the update.
    fn synthesize(
        &self,
        cache: &TileCache,
        step: &TimeStep<'_>,
        params: &SynthesisParams,
    ) -> Result<ClassificationHistogram, SynthesisError>;

    /// Short name for logs and provenance records.
    fn name(&self) -> &'static str;
}

/// The shipped synthesis for `algorithm`.
pub fn for_algorithm(algorithm: Algorithm) -> Result<Box<dyn Synthesis>, SynthesisError> {
    match algorithm {
        Algorithm::MostRecent => Ok(Box::new(MostRecentSynthesis::new())),
        other => Err(SynthesisError::Unsupported(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_algorithm() {
        assert_eq!(
            for_algorithm(Algorithm::MostRecent).unwrap().name(),
            "most-recent"
        );
        assert!(matches!(
            for_algorithm(Algorithm::Average),
            Err(SynthesisError::Unsupported(Algorithm::Average))
        ));
    }

    #[test]
    fn test_params_from_config() {
        let config = EngineConfig::new("/tmp/src", crate::band::Resolution::R60)
            .with_algorithm(Algorithm::RadiometricQuality);
        let params = SynthesisParams::from_config(&config);
        assert_eq!(params.algorithm, Algorithm::RadiometricQuality);
        assert_eq!(params.thresholds, config.thresholds);
    }

    #[test]
    fn test_trait_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn Synthesis>();
    }
}
