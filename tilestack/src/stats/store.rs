//! Persistent per-tile classification statistics.
//!
//! The store is a small JSON document in the target product:
//!
//! ```json
//! {
//!   "classes": [
//!     { "tile_id": "T32TQM", "resolution": 60, "passes": 2, "total_pixels": ..., ... }
//!   ],
//!   "best_value": { "aot_mean": 1.0, "sza_mean": 0.0, "date_time": 0.0 }
//! }
//! ```
//!
//! Every operation reads the file, and every update rewrites it through a
//! temp file and a rename, so no handle is held between operations.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClassificationHistogram, StatsError};
use crate::band::Resolution;

/// File name of the statistics store inside the target product.
pub const STATS_FILE_NAME: &str = ".statistics.json";

/// Counters of one `(footprint, resolution)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRow {
    pub tile_id: String,
    pub resolution: u32,
    /// Number of passes that have updated this row.
    pub passes: u32,
    #[serde(flatten)]
    pub counters: ClassificationHistogram,
}

/// Rolling best-value bookkeeping owned by synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestValueRecord {
    pub aot_mean: f64,
    pub sza_mean: f64,
    pub date_time: f64,
}

impl Default for BestValueRecord {
    fn default() -> Self {
        Self {
            aot_mean: 1.0,
            sza_mean: 0.0,
            date_time: 0.0,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StatsTable {
    classes: Vec<StatsRow>,
    best_value: BestValueRecord,
}

/// Handle to the statistics file.
#[derive(Debug, Clone)]
pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    /// Create a fresh store, replacing any existing file.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, StatsError> {
        let store = Self { path: path.into() };
        store.save(&StatsTable::default())?;
        debug!(path = %store.path.display(), "Statistics store created");
        Ok(store)
    }

    /// Open an existing store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StatsError> {
        let path = path.into();
        if !path.is_file() {
            return Err(StatsError::Missing(path));
        }
        Ok(Self { path })
    }

    /// Open the store, creating it if it does not exist yet.
    pub fn open_or_create(path: impl Into<PathBuf>) -> Result<Self, StatsError> {
        let path = path.into();
        if path.is_file() {
            Ok(Self { path })
        } else {
            Self::create(path)
        }
    }

    /// Store kept inside a target product.
    pub fn in_product(product_dir: &Path) -> PathBuf {
        product_dir.join(STATS_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StatsTable, StatsError> {
        let file = File::open(&self.path).map_err(|source| StatsError::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| StatsError::Parse {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn save(&self, table: &StatsTable) -> Result<(), StatsError> {
        let temp_path = self.path.with_extension("json.tmp");
        let write_err = |source| StatsError::Write {
            path: temp_path.clone(),
            source,
        };
        let file = File::create(&temp_path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, table).map_err(|e| StatsError::Parse {
            path: temp_path.clone(),
            reason: e.to_string(),
        })?;
        writer.flush().map_err(write_err)?;
        drop(writer);

        fs::rename(&temp_path, &self.path).map_err(|source| StatsError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Overwrite the counters of a row with `histogram` and bump its pass
    /// counter, inserting the row if it does not exist.
    ///
    /// # Returns
    ///
    /// The row's pass count after the update.
    pub fn upsert_row(
        &self,
        footprint: &str,
        resolution: Resolution,
        histogram: &ClassificationHistogram,
    ) -> Result<u32, StatsError> {
        let mut table = self.load()?;
        let meters = resolution.meters();
        let passes = match table
            .classes
            .iter_mut()
            .find(|row| row.tile_id == footprint && row.resolution == meters)
        {
            Some(row) => {
                row.passes += 1;
                row.counters = *histogram;
                row.passes
            }
            None => {
                table.classes.push(StatsRow {
                    tile_id: footprint.to_string(),
                    resolution: meters,
                    passes: 1,
                    counters: *histogram,
                });
                1
            }
        };
        self.save(&table)?;
        debug!(footprint, resolution = meters, passes, "Statistics row updated");
        Ok(passes)
    }

    /// The row of `(footprint, resolution)`, if any.
    pub fn row(&self, footprint: &str, resolution: Resolution) -> Result<Option<StatsRow>, StatsError> {
        let meters = resolution.meters();
        Ok(self
            .load()?
            .classes
            .into_iter()
            .find(|row| row.tile_id == footprint && row.resolution == meters))
    }

    /// All rows.
    pub fn rows(&self) -> Result<Vec<StatsRow>, StatsError> {
        Ok(self.load()?.classes)
    }

    /// Sum of the counters of every footprint at `resolution`.
    pub fn aggregate(&self, resolution: Resolution) -> Result<ClassificationHistogram, StatsError> {
        let meters = resolution.meters();
        let mut total = ClassificationHistogram::default();
        for row in self.load()?.classes {
            if row.resolution == meters {
                total += row.counters;
            }
        }
        Ok(total)
    }

    pub fn best_value(&self) -> Result<BestValueRecord, StatsError> {
        Ok(self.load()?.best_value)
    }

    pub fn set_best_value(&self, record: BestValueRecord) -> Result<(), StatsError> {
        let mut table = self.load()?;
        table.best_value = record;
        self.save(&table)
    }
}
