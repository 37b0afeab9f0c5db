//! Error types for psx-sync.

use std::path::PathBuf;

use thiserror::Error;

use psx_core::StoreError;
use psx_fetch::FetchError;

/// All errors that can arise from a sync run or its collaborators.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The current ticker list could not be fetched.
    #[error("failed to fetch current tickers: {0}")]
    Fetch(#[from] FetchError),

    /// The fetch succeeded but produced zero tickers.
    #[error("ticker fetch from {sources} returned no tickers")]
    EmptyResult { sources: String },

    /// An operation needed a stored snapshot and there is none yet.
    #[error("no ticker snapshot at {path}; run `psx sync` first")]
    NoSnapshot { path: PathBuf },

    /// Snapshot or config persistence failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
