//! Snapshot cache errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reading or writing the generation snapshot.
///
/// The differential cache never surfaces these from a connect: read
/// failures fall back to a full rebuild and write failures are logged.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem error on the snapshot path.
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        /// The snapshot path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The snapshot file could not be decoded.
    #[error("Cache file {path} is corrupt: {source}")]
    Corrupt {
        /// The snapshot path involved.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot was written by an incompatible format version.
    #[error("Cache format version mismatch: expected {expected}, found {found}")]
    FormatVersion {
        /// Version this build understands.
        expected: u32,
        /// Version found on disk.
        found: u32,
    },

    /// Atomic rename of the temporary file failed.
    #[error("Failed to persist cache file: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// No cache directory could be determined.
    #[error("No cache directory available")]
    NoCacheDir,
}

impl CacheError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
