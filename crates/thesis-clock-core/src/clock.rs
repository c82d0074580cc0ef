//! Virtual clock state machine.
//!
//! [`ClockState`] is the single source of truth for "what time is it" as
//! seen by the rest of the thesis management application. It abstracts
//! over real and virtual time with three explicit phases:
//!
//! ```text
//!                 enter_editing                 commit
//!  RealTicking ------------------> VirtualEditing -------> VirtualTicking
//!       ^                            |     ^                   |   |
//!       |  revert / cancel (no       |     |   enter_editing   |   |
//!       |  prior virtual time)       |     +-------------------+   |
//!       +----------------------------+                             |
//!       +--------------------------- revert -----------------------+
//! ```
//!
//! Picking a date or time, or setting the clock wholesale, moves either
//! ticking phase to `VirtualTicking`. Cancelling an edit returns to
//! `VirtualTicking` at the pre-edit time if a virtual time was committed
//! before editing began.
//!
//! # Design Principles
//!
//! - The machine performs no I/O. Every transition returns the
//!   [`Effect`]s its owner must carry out (persist, clear, push remote).
//! - Illegal requests are rejected with [`TransitionError`] and leave the
//!   state untouched.
//! - The effective time always has second precision and a four-digit year,
//!   so its digit view can always be derived.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::digits::{DigitError, Digits, WheelOp};
use crate::wall::truncate_to_second;

/// Whether the clock shows real or simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// Tracking the system clock.
    Real,
    /// Showing a user-chosen time.
    Virtual,
}

/// Public name of the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// Re-sampling the real clock every tick.
    RealTicking,
    /// Adding one second of virtual time every tick.
    VirtualTicking,
    /// Ticking suspended while digits are edited.
    VirtualEditing,
}

/// Where an edit session returns to when cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// No virtual time was committed before editing.
    Real,
    /// Editing began from this committed virtual time.
    Virtual(NaiveDateTime),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    RealTicking,
    VirtualTicking,
    VirtualEditing { digits: Digits, resume: Resume },
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Write this virtual time to durable storage.
    Persist(NaiveDateTime),
    /// Remove the stored virtual time.
    ClearPersisted,
    /// Tell the remote authority about this virtual time.
    PushVirtual(NaiveDateTime),
    /// Tell the remote authority to use real time again.
    PushReal,
}

/// The request a [`TransitionError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `enter_editing`.
    EnterEditing,
    /// `apply_digit_edit`.
    DigitEdit,
    /// `commit`.
    Commit,
    /// `cancel_editing`.
    Cancel,
}

/// Errors returned for requests the current phase does not accept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The request only makes sense while editing.
    #[error("{action:?} requires an edit session")]
    NotEditing {
        /// The rejected request.
        action: Action,
    },

    /// An edit session is already open.
    #[error("an edit session is already open")]
    AlreadyEditing,

    /// The requested time cannot be shown on the digit wheel.
    #[error("time cannot be shown on the wheel: {source}")]
    Digits {
        /// The underlying digit error.
        #[from]
        source: DigitError,
    },
}

/// The clock state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockState {
    phase: Phase,
    current: NaiveDateTime,
}

impl ClockState {
    /// Build the initial state.
    ///
    /// A usable persisted virtual time starts the clock in
    /// `VirtualTicking`; otherwise it starts in `RealTicking` at
    /// `real_now`.
    pub fn restore(persisted: Option<NaiveDateTime>, real_now: NaiveDateTime) -> Self {
        match persisted.map(truncate_to_second) {
            Some(virtual_time) if Digits::from_datetime(&virtual_time).is_ok() => Self {
                phase: Phase::VirtualTicking,
                current: virtual_time,
            },
            Some(rejected) => {
                debug!(%rejected, "persisted virtual time not representable, using real time");
                Self::real(real_now)
            }
            None => Self::real(real_now),
        }
    }

    /// A clock tracking real time, currently at `real_now`.
    pub fn real(real_now: NaiveDateTime) -> Self {
        Self {
            phase: Phase::RealTicking,
            current: truncate_to_second(real_now),
        }
    }

    /// The time every consumer should treat as "now".
    pub const fn effective_time(&self) -> NaiveDateTime {
        self.current
    }

    /// Real or virtual. Editing counts as virtual.
    pub const fn mode(&self) -> ClockMode {
        match self.phase {
            Phase::RealTicking => ClockMode::Real,
            Phase::VirtualTicking | Phase::VirtualEditing { .. } => ClockMode::Virtual,
        }
    }

    /// The current phase.
    pub const fn phase(&self) -> PhaseKind {
        match self.phase {
            Phase::RealTicking => PhaseKind::RealTicking,
            Phase::VirtualTicking => PhaseKind::VirtualTicking,
            Phase::VirtualEditing { .. } => PhaseKind::VirtualEditing,
        }
    }

    /// Whether the tick scheduler should be running.
    pub const fn is_ticking(&self) -> bool {
        !matches!(self.phase, Phase::VirtualEditing { .. })
    }

    /// The digit view. While editing this is the wheel being edited,
    /// otherwise it is derived from the effective time.
    ///
    /// # Errors
    ///
    /// Returns [`DigitError`] if the effective time has no four-digit year,
    /// which only happens for real clocks outside years 1000..=9999.
    pub fn digits(&self) -> Result<Digits, DigitError> {
        match &self.phase {
            Phase::VirtualEditing { digits, .. } => Ok(*digits),
            Phase::RealTicking | Phase::VirtualTicking => Digits::from_datetime(&self.current),
        }
    }

    /// Open an edit session seeded from the effective time. Ticking stops.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::AlreadyEditing`] if a session is open.
    pub fn enter_editing(&mut self) -> Result<Vec<Effect>, TransitionError> {
        let resume = match self.phase {
            Phase::RealTicking => Resume::Real,
            Phase::VirtualTicking => Resume::Virtual(self.current),
            Phase::VirtualEditing { .. } => return Err(TransitionError::AlreadyEditing),
        };
        let digits = Digits::from_datetime(&self.current)?;
        self.phase = Phase::VirtualEditing { digits, resume };
        debug!(from = ?resume, at = %self.current, "edit session opened");
        Ok(Vec::new())
    }

    /// Roll one digit and rebuild the effective time from the wheel.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NotEditing`] outside an edit session.
    pub fn apply_digit_edit(&mut self, op: WheelOp) -> Result<Vec<Effect>, TransitionError> {
        let Phase::VirtualEditing { digits, resume } = self.phase else {
            return Err(TransitionError::NotEditing {
                action: Action::DigitEdit,
            });
        };
        let next = digits.apply(op);
        self.current = next.to_datetime()?;
        self.phase = Phase::VirtualEditing {
            digits: next,
            resume,
        };
        Ok(Vec::new())
    }

    /// Close the edit session, making the previewed time the virtual time.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NotEditing`] outside an edit session.
    pub fn commit(&mut self) -> Result<Vec<Effect>, TransitionError> {
        if !matches!(self.phase, Phase::VirtualEditing { .. }) {
            return Err(TransitionError::NotEditing {
                action: Action::Commit,
            });
        }
        self.phase = Phase::VirtualTicking;
        debug!(at = %self.current, "virtual time committed");
        Ok(self.virtual_effects())
    }

    /// Abandon the edit session.
    ///
    /// Returns to the virtual time that was committed before editing, or
    /// to real time if there was none.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NotEditing`] outside an edit session.
    pub fn cancel_editing(
        &mut self,
        real_now: NaiveDateTime,
    ) -> Result<Vec<Effect>, TransitionError> {
        let Phase::VirtualEditing { resume, .. } = self.phase else {
            return Err(TransitionError::NotEditing {
                action: Action::Cancel,
            });
        };
        match resume {
            Resume::Real => *self = Self::real(real_now),
            Resume::Virtual(previous) => {
                self.phase = Phase::VirtualTicking;
                self.current = previous;
            }
        }
        debug!(phase = ?self.phase(), "edit session cancelled");
        Ok(Vec::new())
    }

    /// Merge a picked calendar date into the effective time, keeping the
    /// time of day.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Digits`] for years the wheel cannot show.
    pub fn pick_date(&mut self, date: NaiveDate) -> Result<Vec<Effect>, TransitionError> {
        self.merge(date.and_time(self.current.time()))
    }

    /// Merge a picked time of day into the effective time, keeping the
    /// date.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Digits`] for years the wheel cannot show.
    pub fn pick_time(&mut self, time: NaiveTime) -> Result<Vec<Effect>, TransitionError> {
        self.merge(self.current.date().and_time(time))
    }

    /// Replace the effective time wholesale with a virtual time.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Digits`] for years the wheel cannot show.
    pub fn set_virtual(&mut self, value: NaiveDateTime) -> Result<Vec<Effect>, TransitionError> {
        self.merge(value)
    }

    /// Return to real time and forget the virtual time.
    pub fn revert_to_real(&mut self, real_now: NaiveDateTime) -> Vec<Effect> {
        *self = Self::real(real_now);
        debug!(at = %self.current, "reverted to real time");
        vec![Effect::ClearPersisted, Effect::PushReal]
    }

    /// Advance by one tick.
    ///
    /// Real time is re-sampled rather than incremented so it never drifts.
    /// Virtual time gains exactly one second and must be persisted. Ticks
    /// during an edit session are ignored.
    pub fn tick(&mut self, real_now: NaiveDateTime) -> Vec<Effect> {
        match self.phase {
            Phase::RealTicking => {
                self.current = truncate_to_second(real_now);
                Vec::new()
            }
            Phase::VirtualTicking => {
                // The wheel shows four year digits; time stops at its last second.
                if let Some(next) = self
                    .current
                    .checked_add_signed(TimeDelta::seconds(1))
                    .filter(|next| Digits::from_datetime(next).is_ok())
                {
                    self.current = next;
                }
                vec![Effect::Persist(self.current)]
            }
            Phase::VirtualEditing { .. } => Vec::new(),
        }
    }

    fn merge(&mut self, value: NaiveDateTime) -> Result<Vec<Effect>, TransitionError> {
        let value = truncate_to_second(value);
        let digits = Digits::from_datetime(&value)?;
        self.current = value;
        if let Phase::VirtualEditing { resume, .. } = self.phase {
            // Picks while editing only move the preview.
            self.phase = Phase::VirtualEditing { digits, resume };
            return Ok(Vec::new());
        }
        self.phase = Phase::VirtualTicking;
        debug!(at = %self.current, "virtual time set");
        Ok(self.virtual_effects())
    }

    fn virtual_effects(&self) -> Vec<Effect> {
        vec![Effect::Persist(self.current), Effect::PushVirtual(self.current)]
    }
}
