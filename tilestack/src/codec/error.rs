//! Codec errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while decoding or encoding band files.
///
/// Every variant is fatal to a run: a broken band file means a corrupt mosaic.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("failed to encode {}: {reason}", .path.display())]
    Encode { path: PathBuf, reason: String },

    #[error("malformed container {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
}

impl CodecError {
    /// Path of the file the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            CodecError::Read { path, .. }
            | CodecError::Write { path, .. }
            | CodecError::Decode { path, .. }
            | CodecError::Encode { path, .. }
            | CodecError::Malformed { path, .. } => path,
        }
    }
}
