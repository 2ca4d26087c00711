//! Structured run report.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::band::Resolution;
use crate::error::{EngineError, Result};
use crate::stats::QualityIndicators;

/// Summary of one engine run, written into the target product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub engine_version: String,
    pub resolution: u32,
    pub target_product: String,
    /// Whether the target product was created by this run.
    pub target_created: bool,
    pub started_at: String,
    pub finished_at: String,
    pub elapsed_secs: f64,
    pub products_considered: usize,
    pub products_processed: usize,
    pub tiles_processed: usize,
    pub tiles_skipped_completed: usize,
    pub tiles_skipped_inconsistent: usize,
    pub tiles_filtered: usize,
    /// Why aggregation stopped before the last product, if it did.
    pub termination: Option<String>,
    pub bands_exported: usize,
    pub quality: QualityIndicators,
}

impl RunReport {
    /// `L3_REPORT_R60m.json`
    pub fn file_name(resolution: Resolution) -> String {
        format!("L3_REPORT_{}.json", resolution.dir_name())
    }

    /// Write the report into `dir`, replacing the previous report of the
    /// same resolution.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let resolution = Resolution::from_meters(self.resolution).unwrap_or(Resolution::R60);
        let path = dir.join(Self::file_name(resolution));
        let json = serde_json::to_string_pretty(self).map_err(|e| EngineError::Report {
            path: path.clone(),
            source: e.into(),
        })?;
        fs::write(&path, json).map_err(|source| EngineError::Report {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| EngineError::Report {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| EngineError::Report {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
