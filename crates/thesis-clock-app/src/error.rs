//! Error types for the clock application.
//!
//! [`ServiceError`] is what a [`ClockHandle`](crate::service::ClockHandle)
//! caller sees. [`AppError`] is the top-level error that `main` propagates
//! with `?`.

use thesis_clock_core::TransitionError;
use thesis_clock_store::AuthorityError;

/// Errors returned by clock service requests.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The clock rejected the request in its current phase.
    #[error("clock rejected request: {source}")]
    Transition {
        /// The underlying transition error.
        #[from]
        source: TransitionError,
    },

    /// The remote authority could not answer.
    #[error("remote time authority error: {source}")]
    Authority {
        /// The underlying authority error.
        #[from]
        source: AuthorityError,
    },

    /// The service task has stopped.
    #[error("clock service is not running")]
    Closed,
}

/// Top-level error for the clock binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: thesis_clock_core::ConfigError,
    },

    /// The remote authority client could not be built.
    #[error("authority error: {source}")]
    Authority {
        /// The underlying authority error.
        #[from]
        source: AuthorityError,
    },

    /// A clock request failed.
    #[error("service error: {source}")]
    Service {
        /// The underlying service error.
        #[from]
        source: ServiceError,
    },

    /// Reading the console failed.
    #[error("console I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
