//! Error types for harvest
//!
//! Errors fall into three families: the remote side misbehaved (transport or a
//! non-success status), something we expected to find was not there, or local state
//! could not be read or written. Wrapped library errors are kept as sources.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for harvest
#[derive(Error, Debug)]
pub enum SyncError {
    /// The request never produced a response (DNS, connect, timeout, decode)
    #[error("{service} request failed: {message}")]
    Transport {
        /// Remote service name
        service: &'static str,
        /// Transport error description
        message: String,
    },

    /// The remote service answered with a non-success status
    #[error("{service} returned HTTP {status}: {body}")]
    Api {
        /// Remote service name
        service: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// An expected file, archive member or field is absent
    #[error("Missing data: {0}")]
    MissingData(String),

    /// A state file exists but cannot be used
    #[error("Invalid state file {path}: {reason}")]
    InvalidState {
        /// Path of the offending state file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Reading or writing a persisted file failed
    #[error("Failed to persist {path}: {source}")]
    Persist {
        /// Path that could not be written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading/writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Zip archive errors
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Tag pattern could not be compiled
    #[error("Invalid tag pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl SyncError {
    /// Wrap an I/O error with the path it happened on
    pub fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persist {
            path: path.into(),
            source,
        }
    }

    /// Build an invalid-state error for `path`
    pub fn invalid_state(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised by a remote service rather than local state
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Api { .. })
    }
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, SyncError>;
