//! INI configuration file.
//!
//! ```ini
//! [general]
//! target_directory = DEFAULT
//! log_directory = ~/.tilestack/log
//! log_level = info
//!
//! [synthesis]
//! min_time = 2017-01-01T00:00:00Z
//! max_time = 2017-12-31T23:59:59Z
//! tile_filter = *
//! algorithm = MOST_RECENT
//! radiometric_preference = AEROSOL_OPTICAL_THICKNESS
//! cirrus_removal = false
//! shadow_removal = false
//! snow_removal = false
//! max_cloud_probability = 5.0
//! max_invalid_pixels_percentage = 80.0
//! max_aerosol_optical_thickness = 0.8
//! max_solar_zenith_angle = 70.0
//! median_filter = 0
//!
//! [classifiers]
//! no_data = 0
//! ...
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::{Ini, Properties};
use tracing::debug;

use super::{ConfigError, EngineConfig, Thresholds, TileFilter, TimeRange};
use crate::band::Resolution;
use crate::product::parse_timestamp;

const GENERAL: &str = "general";
const SYNTHESIS: &str = "synthesis";
const CLASSIFIERS: &str = "classifiers";

/// `target_directory` value meaning "next to the source products".
const DEFAULT_TARGET: &str = "DEFAULT";

/// `~/.tilestack`
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilestack")
}

/// `~/.tilestack/config.ini`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.ini")
}

/// `~/.tilestack/log`
pub fn default_log_dir() -> PathBuf {
    default_config_dir().join("log")
}

fn expand_home(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(value),
    }
}

impl EngineConfig {
    /// Load configuration from an INI file.
    ///
    /// # Arguments
    ///
    /// * `path` - Configuration file
    /// * `source_dir` - Directory holding the source products
    /// * `resolution` - Resolution of the run
    pub fn from_ini_file(
        path: &Path,
        source_dir: impl Into<PathBuf>,
        resolution: Resolution,
    ) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "Configuration file loaded");
        Self::from_ini(&ini, source_dir, resolution)
    }

    /// Build configuration from a parsed INI document.
    ///
    /// Keys not present keep their defaults, except the four synthesis
    /// thresholds, which must be given whenever a `[synthesis]` section
    /// exists.
    pub fn from_ini(
        ini: &Ini,
        source_dir: impl Into<PathBuf>,
        resolution: Resolution,
    ) -> Result<Self, ConfigError> {
        let mut config = EngineConfig::new(source_dir, resolution);

        if let Some(general) = ini.section(Some(GENERAL)) {
            if let Some(target) = general.get("target_directory") {
                if target.trim() != DEFAULT_TARGET {
                    config.target_dir = expand_home(target.trim());
                }
            }
            if let Some(log_dir) = general.get("log_directory") {
                config.log_dir = expand_home(log_dir.trim());
            }
            if let Some(level) = general.get("log_level") {
                config.log_level = level.trim().to_lowercase();
            }
        }

        if let Some(synthesis) = ini.section(Some(SYNTHESIS)) {
            let defaults = TimeRange::default();
            let min = optional_time(synthesis, "min_time")?.unwrap_or(defaults.min);
            let max = optional_time(synthesis, "max_time")?.unwrap_or(defaults.max);
            config.time_range = TimeRange { min, max };

            if let Some(filter) = synthesis.get("tile_filter") {
                config.tile_filter = TileFilter::parse(filter);
            }
            if let Some(v) = optional_parsed(synthesis, SYNTHESIS, "algorithm")? {
                config.algorithm = v;
            }
            if let Some(v) = optional_parsed(synthesis, SYNTHESIS, "radiometric_preference")? {
                config.radiometric_preference = v;
            }
            if let Some(v) = optional_bool(synthesis, "cirrus_removal")? {
                config.cirrus_removal = v;
            }
            if let Some(v) = optional_bool(synthesis, "shadow_removal")? {
                config.shadow_removal = v;
            }
            if let Some(v) = optional_bool(synthesis, "snow_removal")? {
                config.snow_removal = v;
            }
            config.thresholds = Thresholds {
                max_cloud_probability: required_f64(synthesis, "max_cloud_probability")?,
                max_invalid_pixels_percentage: required_f64(
                    synthesis,
                    "max_invalid_pixels_percentage",
                )?,
                max_aerosol_optical_thickness: required_f64(
                    synthesis,
                    "max_aerosol_optical_thickness",
                )?,
                max_solar_zenith_angle: required_f64(synthesis, "max_solar_zenith_angle")?,
            };
            if let Some(v) = optional_parsed(synthesis, SYNTHESIS, "median_filter")? {
                config.median_filter = v;
            }
        }

        if let Some(classifiers) = ini.section(Some(CLASSIFIERS)) {
            let c = &mut config.classifiers;
            let fields: [(&str, &mut u8); 12] = [
                ("no_data", &mut c.no_data),
                ("saturated_defective", &mut c.saturated_defective),
                ("dark_features", &mut c.dark_features),
                ("cloud_shadows", &mut c.cloud_shadows),
                ("vegetation", &mut c.vegetation),
                ("not_vegetated", &mut c.not_vegetated),
                ("water", &mut c.water),
                ("unclassified", &mut c.unclassified),
                ("medium_proba_clouds", &mut c.medium_proba_clouds),
                ("high_proba_clouds", &mut c.high_proba_clouds),
                ("thin_cirrus", &mut c.thin_cirrus),
                ("snow_ice", &mut c.snow_ice),
            ];
            for (key, slot) in fields {
                if let Some(code) = optional_parsed(classifiers, CLASSIFIERS, key)? {
                    *slot = code;
                }
            }
        }

        Ok(config)
    }
}

fn optional_parsed<T>(props: &Properties, section: &str, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match props.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::invalid(section, key, raw, e.to_string())),
    }
}

fn required_f64(props: &Properties, key: &str) -> Result<f64, ConfigError> {
    optional_parsed::<f64>(props, SYNTHESIS, key)?.ok_or_else(|| ConfigError::Missing {
        section: SYNTHESIS.to_string(),
        key: key.to_string(),
    })
}

fn optional_bool(props: &Properties, key: &str) -> Result<Option<bool>, ConfigError> {
    match props.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(v) => match v.as_str() {
            "true" | "yes" | "1" | "on" => Ok(Some(true)),
            "false" | "no" | "0" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::invalid(SYNTHESIS, key, v, "expected a boolean")),
        },
    }
}

fn optional_time(
    props: &Properties,
    key: &str,
) -> Result<Option<chrono::NaiveDateTime>, ConfigError> {
    match props.get(key) {
        None => Ok(None),
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .ok_or_else(|| ConfigError::invalid(SYNTHESIS, key, raw, "expected an ISO-8601 time")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Algorithm, RadiometricPreference};

    const FULL: &str = r#"
[general]
target_directory = /data/l3
log_directory = /var/log/tilestack
log_level = DEBUG

[synthesis]
min_time = 2017-01-01T00:00:00Z
max_time = 2017-12-31T23:59:59Z
tile_filter = T32TQM T33UUP
algorithm = RADIOMETRIC_QUALITY
radiometric_preference = SOLAR_ZENITH_ANGLE
cirrus_removal = true
shadow_removal = yes
snow_removal = false
max_cloud_probability = 10
max_invalid_pixels_percentage = 50
max_aerosol_optical_thickness = 0.5
max_solar_zenith_angle = 65
median_filter = 3

[classifiers]
snow_ice = 12
"#;

    #[test]
    fn test_full_file() {
        let ini = Ini::load_from_str(FULL).unwrap();
        let config = EngineConfig::from_ini(&ini, "/data/l2a", Resolution::R20).unwrap();

        assert_eq!(config.target_dir, PathBuf::from("/data/l3"));
        assert_eq!(config.log_dir, PathBuf::from("/var/log/tilestack"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(
            config.time_range.min,
            parse_timestamp("20170101T000000").unwrap()
        );
        assert_eq!(
            config.tile_filter,
            TileFilter::Only(vec!["T32TQM".to_string(), "T33UUP".to_string()])
        );
        assert_eq!(config.algorithm, Algorithm::RadiometricQuality);
        assert_eq!(
            config.radiometric_preference,
            RadiometricPreference::SolarZenithAngle
        );
        assert!(config.cirrus_removal);
        assert!(config.shadow_removal);
        assert!(!config.snow_removal);
        assert_eq!(config.thresholds.max_cloud_probability, 10.0);
        assert_eq!(config.thresholds.max_invalid_pixels_percentage, 50.0);
        assert_eq!(config.median_filter, 3);
        assert_eq!(config.classifiers.snow_ice, 12);
        assert_eq!(config.classifiers.water, 6);
    }

    #[test]
    fn test_default_target_keeps_source_dir() {
        let ini = Ini::load_from_str("[general]\ntarget_directory = DEFAULT\n").unwrap();
        let config = EngineConfig::from_ini(&ini, "/data/l2a", Resolution::R60).unwrap();
        assert_eq!(config.target_dir, PathBuf::from("/data/l2a"));
    }

    #[test]
    fn test_missing_threshold_is_fatal() {
        let ini = Ini::load_from_str(
            "[synthesis]\nmax_cloud_probability = 5\nmax_invalid_pixels_percentage = 80\nmax_solar_zenith_angle = 70\n",
        )
        .unwrap();
        let err = EngineConfig::from_ini(&ini, "/x", Resolution::R60).unwrap_err();
        match err {
            ConfigError::Missing { key, .. } => assert_eq!(key, "max_aerosol_optical_thickness"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_invalid_enum_is_fatal() {
        let ini = Ini::load_from_str(
            "[synthesis]\nalgorithm = BEST\nmax_cloud_probability = 5\nmax_invalid_pixels_percentage = 80\nmax_aerosol_optical_thickness = 1\nmax_solar_zenith_angle = 70\n",
        )
        .unwrap();
        assert!(matches!(
            EngineConfig::from_ini(&ini, "/x", Resolution::R60),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_invalid_time_is_fatal() {
        let ini = Ini::load_from_str(
            "[synthesis]\nmin_time = soon\nmax_cloud_probability = 5\nmax_invalid_pixels_percentage = 80\nmax_aerosol_optical_thickness = 1\nmax_solar_zenith_angle = 70\n",
        )
        .unwrap();
        assert!(matches!(
            EngineConfig::from_ini(&ini, "/x", Resolution::R60),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = EngineConfig::from_ini_file(
            Path::new("/nonexistent/tilestack.ini"),
            "/x",
            Resolution::R60,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
