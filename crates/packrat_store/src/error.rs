//! Error types for store operations.

use std::path::PathBuf;

/// An unexpected I/O failure in the artifact store.
///
/// "Already exists" never surfaces here: concurrent inserts of the same
/// content resolve as success. Anything that does surface is fatal to
/// the invocation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A write, link, copy, or remove failed.
    #[error("store I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
