//! Per-resolution duration baselines carried from run to run.
//!
//! ```ini
//! [time estimation]
//! t_est_60 = 150
//! t_est_20 = 1200
//! t_est_10 = 1200
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use tracing::debug;

use super::ProgressError;
use crate::band::Resolution;

/// File name of the baselines inside the log directory.
pub const ESTIMATION_FILE_NAME: &str = ".estimation";

const SECTION: &str = "time estimation";

fn key(resolution: Resolution) -> &'static str {
    match resolution {
        Resolution::R60 => "t_est_60",
        Resolution::R20 => "t_est_20",
        Resolution::R10 => "t_est_10",
    }
}

fn default_secs(resolution: Resolution) -> f64 {
    match resolution {
        Resolution::R60 => 150.0,
        Resolution::R20 => 1200.0,
        Resolution::R10 => 1200.0,
    }
}

/// Seconds-per-tile baselines for each resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeEstimates {
    path: PathBuf,
    r60: f64,
    r20: f64,
    r10: f64,
}

impl TimeEstimates {
    /// Load the baselines from `log_dir`, writing the defaults first when
    /// the file does not exist yet.
    pub fn load_or_init(log_dir: &Path) -> Result<Self, ProgressError> {
        let path = log_dir.join(ESTIMATION_FILE_NAME);
        if !path.is_file() {
            let estimates = Self {
                path,
                r60: default_secs(Resolution::R60),
                r20: default_secs(Resolution::R20),
                r10: default_secs(Resolution::R10),
            };
            estimates.save()?;
            return Ok(estimates);
        }

        let ini = Ini::load_from_file(&path).map_err(|e| ProgressError::Read {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let read = |resolution: Resolution| -> Result<f64, ProgressError> {
            let value = ini
                .section(Some(SECTION))
                .and_then(|s| s.get(key(resolution)));
            match value {
                None => Ok(default_secs(resolution)),
                Some(raw) => {
                    let secs = raw.trim().parse::<f64>().map_err(|_| ProgressError::Read {
                        path: path.clone(),
                        reason: format!("{} is not a number: {:?}", key(resolution), raw),
                    })?;
                    if secs < 0.0 || Duration::try_from_secs_f64(secs).is_err() {
                        return Err(ProgressError::Read {
                            path: path.clone(),
                            reason: format!("{} is out of range: {:?}", key(resolution), raw),
                        });
                    }
                    Ok(secs)
                }
            }
        };
        Ok(Self {
            r60: read(Resolution::R60)?,
            r20: read(Resolution::R20)?,
            r10: read(Resolution::R10)?,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn slot(&mut self, resolution: Resolution) -> &mut f64 {
        match resolution {
            Resolution::R60 => &mut self.r60,
            Resolution::R20 => &mut self.r20,
            Resolution::R10 => &mut self.r10,
        }
    }

    /// Baseline duration of one tile.
    pub fn per_tile(&self, resolution: Resolution) -> Duration {
        let secs = match resolution {
            Resolution::R60 => self.r60,
            Resolution::R20 => self.r20,
            Resolution::R10 => self.r10,
        };
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Blend a measured per-tile duration into the baseline: the new
    /// baseline is the mean of the old one and the measurement.
    pub fn blend(&mut self, resolution: Resolution, measured: Duration) -> f64 {
        let slot = self.slot(resolution);
        *slot = (*slot + measured.as_secs_f64()) / 2.0;
        *slot
    }

    /// Rewrite the estimation file.
    pub fn save(&self) -> Result<(), ProgressError> {
        let mut ini = Ini::new();
        ini.with_section(Some(SECTION))
            .set(key(Resolution::R60), self.r60.to_string())
            .set(key(Resolution::R20), self.r20.to_string())
            .set(key(Resolution::R10), self.r10.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ProgressError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        ini.write_to_file(&self.path)
            .map_err(|source| ProgressError::Write {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), "Time estimation saved");
        Ok(())
    }
}
