//! Persistence layer for the thesis management virtual clock.
//!
//! Local durable storage holds the committed virtual time so a restart
//! resumes where the user left off. A remote time authority (the backend)
//! is told about every committed change so its own notion of "now", used to
//! hide expired proposals, matches the client.
//!
//! # Architecture
//!
//! ```text
//! ClockService
//!     |
//!     +-- PersistenceBridge
//!           |-- DurableStorage   (FileStorage | MemoryStorage)
//!           +-- TimeAuthority    (Http | Memory)
//! ```
//!
//! # Modules
//!
//! - [`storage`] -- [`DurableStorage`] trait and its implementations
//! - [`authority`] -- [`TimeAuthority`] clients
//! - [`bridge`] -- [`PersistenceBridge`], save/load/clear/push
//! - [`error`] -- Shared error types

pub mod authority;
pub mod bridge;
pub mod error;
pub mod storage;

// Re-export primary types for convenience.
pub use authority::{AuthorityCall, HttpTimeAuthority, MemoryAuthority, RemoteTime, TimeAuthority};
pub use bridge::PersistenceBridge;
pub use error::{AuthorityError, StoreError};
pub use storage::{DurableStorage, FileStorage, MemoryStorage};
