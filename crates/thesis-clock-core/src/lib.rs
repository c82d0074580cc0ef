//! Virtual clock core for the thesis management system.
//!
//! Every role in the application (students, professors, secretariat) can
//! pretend it is a different date and time. This crate holds the pieces
//! of that virtual clock that involve no I/O:
//!
//! # Modules
//!
//! - [`calendar`] -- Leap years and month lengths (simplified rule).
//! - [`digits`] -- The 14-digit rolling wheel and its 28 operations.
//! - [`clock`] -- [`ClockState`], the real/virtual/editing state machine.
//! - [`scheduler`] -- [`TickScheduler`], the single-slot one-second timer.
//! - [`wall`] -- [`WallClock`] sources of real time.
//! - [`config`] -- Configuration loading from `thesis-clock.yaml`.
//!
//! [`ClockState`]: clock::ClockState
//! [`TickScheduler`]: scheduler::TickScheduler
//! [`WallClock`]: wall::WallClock

pub mod calendar;
pub mod clock;
pub mod config;
pub mod digits;
pub mod scheduler;
pub mod wall;

// Re-export primary types for convenience.
pub use clock::{ClockMode, ClockState, Effect, PhaseKind, TransitionError};
pub use config::{ClockConfig, ConfigError};
pub use digits::{DigitError, Digits, Direction, Field, WheelOp};
pub use scheduler::TickScheduler;
pub use wall::{ManualClock, SystemClock, WallClock};
