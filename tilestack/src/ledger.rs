//! Completed-work ledger.
//!
//! A flat text file with one `<footprint>_<orbit>_<resolution>` token per
//! line. A token's presence means that tile was fully aggregated at that
//! resolution and must be skipped on resume. The file is only ever appended
//! to during a run; deduplication is the caller's job (check, then append).

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::band::Resolution;
use crate::product::TileId;

/// File name of the ledger inside the source directory.
pub const LEDGER_FILE_NAME: &str = "processed";

/// Ledger errors. Always fatal: without a working ledger a run cannot be
/// resumed safely.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to read ledger {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to append to ledger {}: {source}", .path.display())]
    Append { path: PathBuf, source: io::Error },

    #[error("failed to remove ledger {}: {source}", .path.display())]
    Remove { path: PathBuf, source: io::Error },
}

/// Append-only record of completed `(tile, resolution)` pairs.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    /// Ledger backed by `path`. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ledger kept next to the source products.
    pub fn in_directory(dir: &Path) -> Self {
        Self::new(dir.join(LEDGER_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded tokens, in append order.
    pub fn entries(&self) -> Result<Vec<String>, LedgerError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(LedgerError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Whether `tile` is recorded as complete at `resolution`.
    pub fn contains(&self, tile: &TileId, resolution: Resolution) -> Result<bool, LedgerError> {
        let key = tile.ledger_key(resolution);
        Ok(self.entries()?.iter().any(|entry| *entry == key))
    }

    /// Record `tile` as complete at `resolution`.
    ///
    /// The line is flushed and synced before returning.
    pub fn append(&self, tile: &TileId, resolution: Resolution) -> Result<(), LedgerError> {
        let key = tile.ledger_key(resolution);
        let append_err = |source| LedgerError::Append {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(append_err)?;
        writeln!(file, "{}", key).map_err(append_err)?;
        file.flush().map_err(append_err)?;
        file.sync_all().map_err(append_err)?;

        debug!(entry = %key, ledger = %self.path.display(), "Ledger entry appended");
        Ok(())
    }

    /// Delete the ledger file. Only used before a clean run starts.
    ///
    /// Returns whether a file was removed.
    pub fn remove(&self) -> Result<bool, LedgerError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(LedgerError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
