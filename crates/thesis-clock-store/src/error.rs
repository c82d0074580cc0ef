//! Error types for the persistence layer.
//!
//! Local storage failures surface as [`StoreError`]; remote time authority
//! failures as [`AuthorityError`]. Neither ever blocks a clock transition:
//! the clock service logs them and tells the user.

use std::path::PathBuf;

/// Errors raised by a [`DurableStorage`](crate::storage::DurableStorage).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the storage file failed.
    #[error("storage I/O error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The storage file could not be encoded or decoded.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by a [`TimeAuthority`](crate::authority::TimeAuthority).
#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    /// The HTTP request could not be sent or its body read.
    #[error("time authority request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The authority answered with a non-success status.
    #[error("time authority returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The authority is unreachable (in-memory authority set to fail).
    #[error("time authority unavailable: {0}")]
    Unavailable(String),

    /// Configuration is invalid.
    #[error("time authority config error: {0}")]
    Config(String),
}
