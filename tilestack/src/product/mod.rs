//! Source products, their naming conventions and granules.

mod consistency;
mod discovery;
mod granule;
mod naming;
mod window;

pub use consistency::{check_granule, Inconsistency};
pub use discovery::{discover_products, SourceProduct};
pub use granule::{Granule, TileId};
pub use naming::{LayoutTable, NamingConvention, SOURCE_PRODUCT_MASK, TARGET_PRODUCT_MASK};
pub use window::{format_compact, parse_timestamp, AcquisitionWindow, COMPACT_TIME_FORMAT};

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while discovering source products.
#[derive(Debug, Error)]
pub enum ProductError {
    #[error("failed to read directory {}: {source}", .path.display())]
    ReadDir { path: PathBuf, source: io::Error },

    #[error("invalid product identifier {identifier}: {reason}")]
    InvalidIdentifier { identifier: String, reason: String },
}
