//! The Level-3 target product.
//!
//! ```text
//! S2A_MSIL03_..._<min_time>.SAFE/
//! ├── .statistics.json
//! ├── MTD_MSIL03.json
//! ├── AUX_DATA/ DATASTRIP/ HTML/ rep_info/      copied from the first source
//! ├── INSPIRE.xml manifest.safe
//! └── GRANULE/
//!     └── L03_<footprint>_<orbit>_<sensing>/
//!         ├── MTD_TL.xml
//!         ├── QI_DATA/
//!         └── IMG_DATA/R60m/.cache/{raw,aggregate}/
//! ```

mod product;
mod tile;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use product::{target_identifier, TargetProduct};
pub use tile::{AggregateTile, AGGREGATE_TILE_PREFIX};

use crate::stats::StatsError;

/// Target product errors. Always fatal.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("target product I/O failed on {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("cannot derive target identifier from {identifier}: {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error(transparent)]
    Stats(#[from] StatsError),
}

pub(crate) fn io_error(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> TargetError {
    let path = path.into();
    move |source| TargetError::Io { path, source }
}
