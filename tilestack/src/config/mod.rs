//! Engine configuration.
//!
//! The configuration file is read once and translated into a plain
//! [`EngineConfig`] record. Every component receives that record by
//! reference; nothing reads configuration from shared state.

mod error;
mod file;

pub use error::ConfigError;
pub use file::{default_config_dir, default_config_path, default_log_dir};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};

use crate::band::Resolution;

/// Compositing algorithm requested from synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    MostRecent,
    TemporalHomogeneity,
    RadiometricQuality,
    Average,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::MostRecent => "MOST_RECENT",
            Algorithm::TemporalHomogeneity => "TEMP_HOMOGENEITY",
            Algorithm::RadiometricQuality => "RADIOMETRIC_QUALITY",
            Algorithm::Average => "AVERAGE",
        }
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MOST_RECENT" => Ok(Algorithm::MostRecent),
            "TEMP_HOMOGENEITY" => Ok(Algorithm::TemporalHomogeneity),
            "RADIOMETRIC_QUALITY" => Ok(Algorithm::RadiometricQuality),
            "AVERAGE" => Ok(Algorithm::Average),
            other => Err(format!("unknown algorithm: {}", other)),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the radiometric-quality algorithm optimises for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiometricPreference {
    AerosolOpticalThickness,
    SolarZenithAngle,
    CirrusRemoval,
}

impl RadiometricPreference {
    pub fn as_str(self) -> &'static str {
        match self {
            RadiometricPreference::AerosolOpticalThickness => "AEROSOL_OPTICAL_THICKNESS",
            RadiometricPreference::SolarZenithAngle => "SOLAR_ZENITH_ANGLE",
            RadiometricPreference::CirrusRemoval => "CIRRUS_REMOVAL",
        }
    }
}

impl FromStr for RadiometricPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AEROSOL_OPTICAL_THICKNESS" => Ok(RadiometricPreference::AerosolOpticalThickness),
            "SOLAR_ZENITH_ANGLE" => Ok(RadiometricPreference::SolarZenithAngle),
            "CIRRUS_REMOVAL" => Ok(RadiometricPreference::CirrusRemoval),
            other => Err(format!("unknown radiometric preference: {}", other)),
        }
    }
}

/// Quality thresholds, all in percent except the aerosol thickness and the
/// zenith angle (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub max_cloud_probability: f64,
    pub max_invalid_pixels_percentage: f64,
    pub max_aerosol_optical_thickness: f64,
    pub max_solar_zenith_angle: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_cloud_probability: 5.0,
            max_invalid_pixels_percentage: 80.0,
            max_aerosol_optical_thickness: 0.8,
            max_solar_zenith_angle: 70.0,
        }
    }
}

/// Scene classification codes used in the classification map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifiers {
    pub no_data: u8,
    pub saturated_defective: u8,
    pub dark_features: u8,
    pub cloud_shadows: u8,
    pub vegetation: u8,
    pub not_vegetated: u8,
    pub water: u8,
    pub unclassified: u8,
    pub medium_proba_clouds: u8,
    pub high_proba_clouds: u8,
    pub thin_cirrus: u8,
    pub snow_ice: u8,
}

impl Default for Classifiers {
    fn default() -> Self {
        Self {
            no_data: 0,
            saturated_defective: 1,
            dark_features: 2,
            cloud_shadows: 3,
            vegetation: 4,
            not_vegetated: 5,
            water: 6,
            unclassified: 7,
            medium_proba_clouds: 8,
            high_proba_clouds: 9,
            thin_cirrus: 10,
            snow_ice: 11,
        }
    }
}

/// Which granules to process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TileFilter {
    #[default]
    All,
    /// Granules whose name contains any of these fragments.
    Only(Vec<String>),
}

impl TileFilter {
    /// Parse a whitespace separated list; `*` (or nothing) selects all.
    pub fn parse(value: &str) -> Self {
        let items: Vec<String> = value.split_whitespace().map(str::to_string).collect();
        if items.is_empty() || items.iter().any(|i| i == "*") {
            TileFilter::All
        } else {
            TileFilter::Only(items)
        }
    }

    /// Whether a granule name passes the filter.
    pub fn matches(&self, granule_name: &str) -> bool {
        match self {
            TileFilter::All => true,
            TileFilter::Only(items) => items.iter().any(|item| granule_name.contains(item.as_str())),
        }
    }
}

/// Inclusive acquisition time range of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub min: NaiveDateTime,
    pub max: NaiveDateTime,
}

impl Default for TimeRange {
    fn default() -> Self {
        let min = NaiveDate::from_ymd_opt(2015, 6, 23)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        let max = NaiveDate::from_ymd_opt(2099, 12, 31)
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .unwrap_or(NaiveDateTime::MAX);
        Self { min, max }
    }
}

/// Complete configuration of one engine run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding the Level-2A source products.
    pub source_dir: PathBuf,
    /// Directory the target product is created in.
    pub target_dir: PathBuf,
    /// Directory for logs, the progress file and timing estimates.
    pub log_dir: PathBuf,
    /// Tracing filter directive, e.g. `info` or `tilestack=debug`.
    pub log_level: String,
    pub resolution: Resolution,
    /// Remove an existing target product and ledger before the run.
    pub clean: bool,
    pub time_range: TimeRange,
    pub tile_filter: TileFilter,
    pub algorithm: Algorithm,
    pub radiometric_preference: RadiometricPreference,
    pub cirrus_removal: bool,
    pub shadow_removal: bool,
    pub snow_removal: bool,
    pub thresholds: Thresholds,
    /// Median filter window edge applied on export; 0 disables it.
    pub median_filter: usize,
    pub classifiers: Classifiers,
}

impl EngineConfig {
    /// Configuration with defaults for everything but the source directory.
    ///
    /// The target product is created next to the sources.
    pub fn new(source_dir: impl Into<PathBuf>, resolution: Resolution) -> Self {
        let source_dir = source_dir.into();
        Self {
            target_dir: source_dir.clone(),
            source_dir,
            log_dir: default_log_dir(),
            log_level: "info".to_string(),
            resolution,
            clean: false,
            time_range: TimeRange::default(),
            tile_filter: TileFilter::All,
            algorithm: Algorithm::MostRecent,
            radiometric_preference: RadiometricPreference::AerosolOpticalThickness,
            cirrus_removal: false,
            shadow_removal: false,
            snow_removal: false,
            thresholds: Thresholds::default(),
            median_filter: 0,
            classifiers: Classifiers::default(),
        }
    }

    pub fn with_target_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.target_dir = dir.into();
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn with_time_range(mut self, min: NaiveDateTime, max: NaiveDateTime) -> Self {
        self.time_range = TimeRange { min, max };
        self
    }

    pub fn with_tile_filter(mut self, filter: TileFilter) -> Self {
        self.tile_filter = filter;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_radiometric_preference(mut self, preference: RadiometricPreference) -> Self {
        self.radiometric_preference = preference;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_median_filter(mut self, size: usize) -> Self {
        self.median_filter = size;
        self
    }

    /// Whether granules must carry aerosol optical thickness.
    pub fn requires_aerosol(&self) -> bool {
        self.algorithm == Algorithm::RadiometricQuality
            && self.radiometric_preference == RadiometricPreference::AerosolOpticalThickness
    }

    /// Check ranges and cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_range.min > self.time_range.max {
            return Err(ConfigError::InvertedTimeRange {
                min: self.time_range.min.to_string(),
                max: self.time_range.max.to_string(),
            });
        }
        let percentages = [
            ("max_cloud_probability", self.thresholds.max_cloud_probability),
            (
                "max_invalid_pixels_percentage",
                self.thresholds.max_invalid_pixels_percentage,
            ),
        ];
        for (key, value) in percentages {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::invalid(
                    "synthesis",
                    key,
                    value.to_string(),
                    "must be between 0 and 100",
                ));
            }
        }
        if !self.thresholds.max_aerosol_optical_thickness.is_finite()
            || self.thresholds.max_aerosol_optical_thickness < 0.0
        {
            return Err(ConfigError::invalid(
                "synthesis",
                "max_aerosol_optical_thickness",
                self.thresholds.max_aerosol_optical_thickness.to_string(),
                "must be non-negative",
            ));
        }
        if !(0.0..=90.0).contains(&self.thresholds.max_solar_zenith_angle) {
            return Err(ConfigError::invalid(
                "synthesis",
                "max_solar_zenith_angle",
                self.thresholds.max_solar_zenith_angle.to_string(),
                "must be between 0 and 90 degrees",
            ));
        }
        if !self.source_dir.is_dir() {
            return Err(ConfigError::MissingDirectory(self.source_dir.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::parse_timestamp;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::new("/data/l2a", Resolution::R60);
        assert_eq!(config.target_dir, PathBuf::from("/data/l2a"));
        assert_eq!(config.algorithm, Algorithm::MostRecent);
        assert_eq!(config.tile_filter, TileFilter::All);
        assert_eq!(config.classifiers.snow_ice, 11);
        assert!(!config.clean);
    }

    #[test]
    fn test_tile_filter_second_item_only_matches() {
        let filter = TileFilter::parse("T99ZZZ A010442");
        assert!(filter.matches("L2A_T32TQM_A010442_20170618T100431"));
    }

    #[test]
    fn test_tile_filter_no_item_matches() {
        let filter = TileFilter::Only(vec!["T99ZZZ".to_string(), "A010442".to_string()]);
        assert!(!filter.matches("L2A_T32TQM_A010441_20170608T100431"));
        assert!(TileFilter::All.matches("L2A_T32TQM_A010441_20170608T100431"));
    }

    #[test]
    fn test_default_time_range() {
        let range = TimeRange::default();
        assert_eq!(range.min, parse_timestamp("20150623T000000").unwrap());
        assert_eq!(range.max, parse_timestamp("20991231T235959").unwrap());
    }

    #[test]
    fn test_builder_pattern() {
        let config = EngineConfig::new("/data/l2a", Resolution::R60)
            .with_target_dir("/data/l3")
            .with_resolution(Resolution::R20)
            .with_clean(true)
            .with_median_filter(3)
            .with_algorithm(Algorithm::RadiometricQuality);

        assert_eq!(config.target_dir, PathBuf::from("/data/l3"));
        assert_eq!(config.resolution, Resolution::R20);
        assert!(config.clean);
        assert_eq!(config.median_filter, 3);
        assert!(config.requires_aerosol());
    }

    #[test]
    fn test_requires_aerosol_needs_both_settings() {
        let config = EngineConfig::new("/x", Resolution::R60)
            .with_algorithm(Algorithm::RadiometricQuality)
            .with_radiometric_preference(RadiometricPreference::SolarZenithAngle);
        assert!(!config.requires_aerosol());
    }

    #[test]
    fn test_tile_filter_any_item_matches() {
        let filter = TileFilter::parse("T32TQM T33UUP");
        assert!(filter.matches("L2A_T32TQM_A010440_20170608T100435"));
        assert!(filter.matches("L2A_T33UUP_A010440_20170608T100435"));
        assert!(!filter.matches("L2A_T31TCJ_A010440_20170608T100435"));
    }

    #[test]
    fn test_tile_filter_wildcard() {
        assert_eq!(TileFilter::parse("*"), TileFilter::All);
        assert_eq!(TileFilter::parse("  "), TileFilter::All);
        assert!(TileFilter::parse("T32TQM *").matches("anything"));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new(dir.path(), Resolution::R60).with_time_range(
            parse_timestamp("20180101T000000").unwrap(),
            parse_timestamp("20170101T000000").unwrap(),
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedTimeRange { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new(dir.path(), Resolution::R60).with_thresholds(Thresholds {
            max_cloud_probability: 120.0,
            ..Thresholds::default()
        });
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_validate_requires_source_dir() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new(dir.path().join("missing"), Resolution::R60);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingDirectory(_))
        ));
        let config = EngineConfig::new(dir.path(), Resolution::R60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("temp_homogeneity".parse(), Ok(Algorithm::TemporalHomogeneity));
        assert!("BEST".parse::<Algorithm>().is_err());
        assert_eq!(
            "CIRRUS_REMOVAL".parse(),
            Ok(RadiometricPreference::CirrusRemoval)
        );
    }
}
