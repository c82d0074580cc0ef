//! One-second tick driver for the virtual clock.
//!
//! [`TickScheduler`] owns at most one timer. The owner awaits
//! [`TickScheduler::next_tick`] inside its event loop (typically in a
//! `tokio::select!` next to its command channel) and advances the clock
//! each time it resolves.
//!
//! The single timer slot is what keeps virtual time honest: [`start`]
//! always drops the previous timer before arming a new one, so restarting
//! on every state transition can never leave two streams advancing the
//! clock.
//!
//! [`start`]: TickScheduler::start

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::trace;

use crate::config::TickConfig;

/// Cancellable, restartable periodic tick source.
#[derive(Debug)]
pub struct TickScheduler {
    period: Duration,
    timer: Option<Interval>,
    /// Number of times the timer was (re)armed.
    generation: u64,
}

impl TickScheduler {
    /// Create a stopped scheduler with the given period.
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            timer: None,
            generation: 0,
        }
    }

    /// Create a stopped scheduler from configuration.
    pub const fn from_config(config: &TickConfig) -> Self {
        Self::new(Duration::from_millis(config.tick_interval_ms))
    }

    /// Arm the timer, replacing any running one. The first tick fires one
    /// full period from now.
    pub fn start(&mut self) {
        // tokio rejects a zero period.
        let period = self.period.max(Duration::from_millis(1));
        let first = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
        let mut timer = tokio::time::interval_at(first, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
        self.generation = self.generation.saturating_add(1);
        trace!(generation = self.generation, "tick timer armed");
    }

    /// Disarm the timer. Idempotent.
    pub fn stop(&mut self) {
        if self.timer.take().is_some() {
            trace!(generation = self.generation, "tick timer disarmed");
        }
    }

    /// Whether a timer is armed.
    pub const fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// The tick period.
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// How many times the timer has been armed.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for the next tick. Never resolves while stopped.
    ///
    /// Cancel-safe: dropping the future before it resolves loses no tick.
    pub async fn next_tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
