//! Error taxonomy for download attempts and session configuration.
//!
//! Transport, HTTP-status, empty-response and filesystem failures are all
//! recovered by the retry/fallback loop and only surface as a job's terminal
//! failure once every URL/attempt is exhausted. Cancellation and invalid
//! configuration are never retried.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of one download attempt, or of a whole submission.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level failure: DNS, connect, TLS, read, or per-attempt timeout.
    #[error("transport: {0}")]
    Transport(#[from] curl::Error),

    /// Server answered with a non-success HTTP status.
    #[error("HTTP {0}")]
    HttpStatus(u32),

    /// Transfer completed but produced zero bytes.
    #[error("downloaded file is empty")]
    EmptyResponse,

    /// Directory creation, temp staging, rename or permission change failed.
    #[error("filesystem: {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Operation stopped by a cancellation token.
    #[error("cancelled")]
    Cancelled,

    /// Bad job or pool configuration; reported synchronously at submission.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DownloadError {
    /// True for failures the retry/fallback loop may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::HttpStatus(_) | Self::EmptyResponse | Self::Filesystem { .. }
        )
    }

    /// True when the error is a cooperative cancellation, not a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}
