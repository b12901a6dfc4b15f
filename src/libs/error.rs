//! Error taxonomy for the update engine.
//!
//! Every failure an update cycle can produce maps onto exactly one
//! [`ErrorKind`], so a host can decide how to surface it (retry later,
//! report a corrupted release, ask the user to restart, ...) without
//! matching on message text.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, UpdateError>;

/// Coarse classification of [`UpdateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network unreachable, HTTP error status or timeout.
    Transport,
    /// Malformed manifest or release index.
    Format,
    /// A manifest or archive path tried to escape the install root.
    PathSafety,
    /// The package does not contain what the manifest promised.
    Integrity,
    /// Copying or renaming a file into the install root failed.
    Apply,
    /// Deferred work requested without a relaunchable packaged executable.
    Configuration,
    /// The caller cancelled the cycle or another cycle holds the lock.
    Interrupted,
    /// Local I/O outside the apply step (temp area, hashing, staging).
    Io,
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("invalid manifest: {0}")]
    Format(String),

    #[error("unsafe path {path:?}: {reason}")]
    PathSafety { path: String, reason: &'static str },

    #[error("package integrity check failed: {0}")]
    Integrity(String),

    #[error("failed to apply {path}: {source}")]
    Apply {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("update cycle cancelled")]
    Cancelled,

    #[error("another update cycle is already running")]
    Busy,

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unreadable package: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl UpdateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpdateError::Transport { .. } | UpdateError::Http { .. } => ErrorKind::Transport,
            UpdateError::Format(_) | UpdateError::Json(_) => ErrorKind::Format,
            UpdateError::PathSafety { .. } => ErrorKind::PathSafety,
            UpdateError::Integrity(_) | UpdateError::Zip(_) => ErrorKind::Integrity,
            UpdateError::Apply { .. } => ErrorKind::Apply,
            UpdateError::Configuration(_) => ErrorKind::Configuration,
            UpdateError::Cancelled | UpdateError::Busy => ErrorKind::Interrupted,
            UpdateError::Io { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        UpdateError::Io { path: path.into(), source }
    }

    pub(crate) fn transport(url: &str, source: reqwest::Error) -> Self {
        UpdateError::Transport {
            url: url.to_string(),
            source,
        }
    }
}
