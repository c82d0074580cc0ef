//! The thesis management virtual clock as a running service.
//!
//! Wires the core state machine and scheduler to local storage and the
//! remote time authority, and exposes the result to the rest of the
//! application through a [`ClockHandle`].
//!
//! # Modules
//!
//! - [`service`] -- [`ClockService`] actor, [`ClockHandle`], [`ClockSnapshot`]
//! - [`notify`] -- User-facing [`Notice`]s
//! - [`command`] -- Console command parsing and execution
//! - [`error`] -- [`ServiceError`] and [`AppError`]
//!
//! [`ClockService`]: service::ClockService
//! [`ClockHandle`]: service::ClockHandle
//! [`ClockSnapshot`]: service::ClockSnapshot
//! [`Notice`]: notify::Notice
//! [`ServiceError`]: error::ServiceError
//! [`AppError`]: error::AppError

pub mod command;
pub mod error;
pub mod notify;
pub mod service;

pub use command::{CommandError, ConsoleCommand, Outcome};
pub use error::{AppError, ServiceError};
pub use notify::{Notice, NoticeLevel};
pub use service::{ClockHandle, ClockService, ClockSnapshot};
