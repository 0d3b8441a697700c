//! Error types for the NFS HA agent core.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reconciling shared cluster state.
#[derive(Debug, Error)]
pub enum HaError {
    /// Invalid or incomplete configuration.
    #[error("configuration error: {msg}")]
    Config {
        /// Description of the configuration problem.
        msg: String,
    },

    /// A filesystem operation failed. Never retried internally; the cluster
    /// event dispatcher owns retry policy.
    #[error("filesystem error at {path}: {source}")]
    Fs {
        /// The path the failed operation was touching.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Starting or stopping the service daemon failed.
    #[error("service control failed: {msg}")]
    Service {
        /// Description of the service-control failure.
        msg: String,
    },
}

impl HaError {
    /// Builds a `Config` error from anything displayable.
    pub fn config(msg: impl Into<String>) -> Self {
        HaError::Config { msg: msg.into() }
    }
}

/// Attaches a path to an `io::Error`, for use with `map_err`.
pub(crate) fn fs_err(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> HaError + '_ {
    move |source| HaError::Fs {
        path: path.to_path_buf(),
        source,
    }
}

/// Result type alias using `HaError` as the error type.
pub type HaResult<T> = std::result::Result<T, HaError>;
