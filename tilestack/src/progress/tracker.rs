use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::ProgressError;

/// File name of the progress scalar inside the log directory.
pub const PROGRESS_FILE_NAME: &str = ".progress";

/// Ratio where the linear curve hands over to the exponential tail.
const KNEE: f64 = 0.98;

/// Decay length of the tail; equal to `1 - KNEE` so the slope is continuous.
const TAIL: f64 = 1.0 - KNEE;

/// Map the naive ratio `elapsed / estimate` to a reported percentage.
///
/// Linear up to the knee, then an exponential tail that approaches but never
/// reaches 100. The curve is continuous and strictly increasing.
pub fn displayed_percentage(ratio: f64) -> f64 {
    let ratio = ratio.max(0.0);
    if ratio <= KNEE {
        ratio * 100.0
    } else {
        100.0 - TAIL * 100.0 * (-(ratio - KNEE) / TAIL).exp()
    }
}

/// Persisted progress of one engine run.
#[derive(Debug)]
pub struct ProgressTracker {
    path: PathBuf,
    estimate: Duration,
    elapsed: Duration,
    percentage: f64,
}

impl ProgressTracker {
    /// Reset the progress file to zero and start tracking.
    ///
    /// # Arguments
    ///
    /// * `log_dir` - Directory receiving `.progress`
    /// * `per_tile` - Baseline duration of one tile at the run's resolution
    /// * `tiles` - Number of eligible tiles counted at run start
    pub fn start(log_dir: &Path, per_tile: Duration, tiles: usize) -> Result<Self, ProgressError> {
        fs::create_dir_all(log_dir).map_err(|source| ProgressError::Write {
            path: log_dir.to_path_buf(),
            source,
        })?;
        let estimate = per_tile.saturating_mul(tiles.max(1) as u32);
        let tracker = Self {
            path: log_dir.join(PROGRESS_FILE_NAME),
            estimate: if estimate.is_zero() {
                Duration::from_secs(1)
            } else {
                estimate
            },
            elapsed: Duration::ZERO,
            percentage: 0.0,
        };
        tracker.persist()?;
        debug!(
            estimate_secs = tracker.estimate.as_secs_f64(),
            tiles, "Progress tracking started"
        );
        Ok(tracker)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current reported percentage.
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    /// Total time accounted so far.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Account one completed tile and persist the new percentage.
    pub fn record_step(&mut self, step: Duration) -> Result<f64, ProgressError> {
        self.elapsed += step;
        let ratio = self.elapsed.as_secs_f64() / self.estimate.as_secs_f64();
        // Never report a regression, even across float rounding.
        self.percentage = displayed_percentage(ratio).max(self.percentage);
        self.persist()?;
        Ok(self.percentage)
    }

    fn persist(&self) -> Result<(), ProgressError> {
        fs::write(&self.path, format!("{}\n", self.percentage)).map_err(|source| {
            ProgressError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Read a persisted percentage.
    pub fn read(path: &Path) -> Result<f64, ProgressError> {
        let content = fs::read_to_string(path).map_err(|e| ProgressError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        content.trim().parse().map_err(|_| ProgressError::Read {
            path: path.to_path_buf(),
            reason: format!("not a number: {:?}", content.trim()),
        })
    }
}
