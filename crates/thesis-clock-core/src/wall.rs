//! Sources of real wall-clock time.
//!
//! The clock never reads the system time directly; it asks a [`WallClock`].
//! Production code uses [`SystemClock`], tests drive a [`ManualClock`].

use std::fmt;
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime, TimeDelta, Timelike};

/// A source of the current real local time.
pub trait WallClock: Send + Sync + fmt::Debug {
    /// Current local wall time, truncated to whole seconds.
    fn now(&self) -> NaiveDateTime;
}

/// The operating system's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        truncate_to_second(Local::now().naive_local())
    }
}

/// A wall clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(truncate_to_second(start)),
        }
    }

    /// Jump to `value`.
    pub fn set(&self, value: NaiveDateTime) {
        let mut guard = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = truncate_to_second(value);
    }

    /// Move forward by `seconds`.
    pub fn advance_seconds(&self, seconds: i64) {
        let mut guard = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(next) =
            TimeDelta::try_seconds(seconds).and_then(|delta| guard.checked_add_signed(delta))
        {
            *guard = next;
        }
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Drop any sub-second component.
pub fn truncate_to_second(value: NaiveDateTime) -> NaiveDateTime {
    value.with_nanosecond(0).unwrap_or(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").unwrap()
    }

    #[test]
    fn system_clock_has_no_subseconds() {
        assert_eq!(SystemClock.now().nanosecond(), 0);
    }

    #[test]
    fn manual_clock_moves_on_request() {
        let clock = ManualClock::new(at("2024-03-10T10:00:00.750"));
        assert_eq!(clock.now(), at("2024-03-10T10:00:00"));
        clock.advance_seconds(61);
        assert_eq!(clock.now(), at("2024-03-10T10:01:01"));
        clock.set(at("2030-01-01T00:00:00"));
        assert_eq!(clock.now(), at("2030-01-01T00:00:00"));
    }
}
