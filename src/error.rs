//! Error types for imgfetch
//!
//! Every failure carries enough context (URL, path, item name) to identify
//! the job it belongs to. Per-job errors never escape their task: they travel
//! through the pipeline's result queues as data and end up in a
//! [`FetchOutcome`](crate::types::FetchOutcome) or
//! [`TransformOutcome`](crate::types::TransformOutcome).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for imgfetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for imgfetch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "urls")
        key: Option<String>,
    },

    /// A stale output file could not be removed before the run
    #[error("failed to remove stale file {path}: {source}")]
    Cleanup {
        /// The file (or directory being scanned) that caused the failure
        path: PathBuf,
        /// Underlying filesystem error
        #[source]
        source: std::io::Error,
    },

    /// The request could not be completed (DNS, connection, timeout)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL being fetched
        url: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with something other than 200 OK
    #[error("received non 200 response code {status} from {url}")]
    BadStatus {
        /// The URL being fetched
        url: String,
        /// The status the server returned
        status: reqwest::StatusCode,
    },

    /// Creating the destination file or copying the body into it failed
    #[error("I/O error writing {path}: {source}")]
    Io {
        /// The destination file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A transform could not produce its derived artifact
    #[error("transform of {item} to profile {profile} failed: {reason}")]
    Transform {
        /// The downloaded item being transformed
        item: String,
        /// Name of the size profile
        profile: String,
        /// Why the transform failed
        reason: String,
    },

    /// The unit of work was cancelled before it finished
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Machine-readable error code, stable across releases
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Cleanup { .. } => "cleanup_error",
            Error::Network { .. } => "network_error",
            Error::BadStatus { .. } => "bad_status",
            Error::Io { .. } => "io_error",
            Error::Transform { .. } => "transform_error",
            Error::Cancelled => "cancelled",
        }
    }

    /// Shorthand for building a [`Error::Config`]
    pub(crate) fn config(message: impl Into<String>, key: Option<&str>) -> Self {
        Error::Config {
            message: message.into(),
            key: key.map(str::to_string),
        }
    }
}
