//! The clock service: single owner of the virtual clock.
//!
//! [`ClockService`] runs as one tokio task holding the [`ClockState`], the
//! [`TickScheduler`] and the [`PersistenceBridge`]. Everything else talks
//! to it through a cloneable [`ClockHandle`]:
//!
//! ```text
//!  ClockHandle --(mpsc Command)--> ClockService --(watch)--> ClockSnapshot readers
//!                                    |   ^                \-(broadcast)--> Notice readers
//!                                    |   |
//!                               save/clear  next_tick
//!                                    v
//!                           PersistenceBridge --(spawned push)--> TimeAuthority
//! ```
//!
//! # Event loop
//!
//! The task selects between the command channel and the scheduler's next
//! tick. After every successful transition it carries out the returned
//! effects, re-arms or disarms the scheduler, and publishes a fresh
//! snapshot. Remote pushes run in their own tasks so a slow backend never
//! delays a transition; their failures become warnings and notices, never
//! rollbacks.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use thesis_clock_core::config::TickConfig;
use thesis_clock_core::{
    ClockMode, ClockState, Digits, Effect, PhaseKind, TickScheduler, WallClock, WheelOp,
};
use thesis_clock_store::{PersistenceBridge, RemoteTime};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::notify::{self, NOTICE_CAPACITY, Notice};

/// Capacity of the command channel.
const COMMAND_BUFFER: usize = 32;

/// Odometer display format, `MM/DD/YYYY HH:MM:SS`.
pub const DISPLAY_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only view of the clock, published after every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockSnapshot {
    /// Real or virtual.
    pub mode: ClockMode,
    /// The state machine phase.
    pub phase: PhaseKind,
    /// The time the application treats as "now".
    pub effective: NaiveDateTime,
    /// The digit wheel, absent only for real clocks outside years
    /// 1000..=9999.
    pub digits: Option<Digits>,
}

impl ClockSnapshot {
    fn of(state: &ClockState) -> Self {
        Self {
            mode: state.mode(),
            phase: state.phase(),
            effective: state.effective_time(),
            digits: state.digits().ok(),
        }
    }

    /// Whether `deadline` lies strictly before the effective time.
    ///
    /// Views use this to hide proposals whose expiration date has passed
    /// according to the clock the user has chosen.
    pub fn has_passed(&self, deadline: NaiveDateTime) -> bool {
        deadline < self.effective
    }

    /// Whether the clock shows virtual time (ticking or being edited).
    pub const fn is_virtual(&self) -> bool {
        matches!(self.mode, ClockMode::Virtual)
    }
}

impl fmt::Display for ClockSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.phase {
            PhaseKind::RealTicking => "real",
            PhaseKind::VirtualTicking => "virtual",
            PhaseKind::VirtualEditing => "editing",
        };
        match self.digits {
            Some(digits) => write!(f, "{digits} ({label})"),
            None => write!(f, "{} ({label})", self.effective.format(DISPLAY_FORMAT)),
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// A request that changes the clock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    EnterEditing,
    DigitEdit(WheelOp),
    Commit,
    Cancel,
    PickDate(NaiveDate),
    PickTime(NaiveTime),
    SetVirtual(NaiveDateTime),
    RevertToReal,
}

#[derive(Debug)]
enum Command {
    Transition {
        request: Request,
        reply: oneshot::Sender<Result<ClockSnapshot, ServiceError>>,
    },
    Remote {
        reply: oneshot::Sender<Result<RemoteTime, ServiceError>>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable access to a running [`ClockService`].
///
/// Mutating requests wait for the service to apply them and return the
/// resulting snapshot. Reads never wait.
#[derive(Debug, Clone)]
pub struct ClockHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<ClockSnapshot>,
    notices: broadcast::Sender<Notice>,
}

impl ClockHandle {
    /// Open an edit session seeded from the effective time.
    pub async fn enter_editing(&self) -> Result<ClockSnapshot, ServiceError> {
        self.transition(Request::EnterEditing).await
    }

    /// Roll one digit of the wheel being edited.
    pub async fn apply_digit_edit(&self, op: WheelOp) -> Result<ClockSnapshot, ServiceError> {
        self.transition(Request::DigitEdit(op)).await
    }

    /// Make the edited time the virtual time.
    pub async fn commit(&self) -> Result<ClockSnapshot, ServiceError> {
        self.transition(Request::Commit).await
    }

    /// Abandon the edit session.
    pub async fn cancel_editing(&self) -> Result<ClockSnapshot, ServiceError> {
        self.transition(Request::Cancel).await
    }

    /// Move to `date`, keeping the time of day.
    pub async fn pick_date(&self, date: NaiveDate) -> Result<ClockSnapshot, ServiceError> {
        self.transition(Request::PickDate(date)).await
    }

    /// Move to `time`, keeping the date.
    pub async fn pick_time(&self, time: NaiveTime) -> Result<ClockSnapshot, ServiceError> {
        self.transition(Request::PickTime(time)).await
    }

    /// Replace the effective time with `value` and run virtual time from
    /// there.
    pub async fn set_virtual_clock(
        &self,
        value: NaiveDateTime,
    ) -> Result<ClockSnapshot, ServiceError> {
        self.transition(Request::SetVirtual(value)).await
    }

    /// Go back to real time and forget the virtual time.
    pub async fn revert_to_real(&self) -> Result<ClockSnapshot, ServiceError> {
        self.transition(Request::RevertToReal).await
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> ClockSnapshot {
        *self.snapshots.borrow()
    }

    /// The time the application treats as "now".
    pub fn effective_time(&self) -> NaiveDateTime {
        self.snapshot().effective
    }

    /// A receiver that is notified on every tick and transition.
    pub fn subscribe(&self) -> watch::Receiver<ClockSnapshot> {
        self.snapshots.clone()
    }

    /// A receiver for user-facing notices raised from now on.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Ask the remote authority which time it is using.
    pub async fn remote_time(&self) -> Result<RemoteTime, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Remote { reply }).await?;
        rx.await.unwrap_or(Err(ServiceError::Closed))
    }

    /// Stop the service and its timer. Idempotent.
    pub async fn shutdown(&self) {
        if self.commands.send(Command::Shutdown).await.is_err() {
            debug!("clock service already stopped");
        }
    }

    async fn transition(&self, request: Request) -> Result<ClockSnapshot, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Transition { request, reply }).await?;
        rx.await.unwrap_or(Err(ServiceError::Closed))
    }

    async fn send(&self, command: Command) -> Result<(), ServiceError> {
        if self.commands.send(command).await.is_err() {
            return Err(ServiceError::Closed);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// The task that owns the clock.
#[derive(Debug)]
pub struct ClockService {
    state: ClockState,
    scheduler: TickScheduler,
    bridge: PersistenceBridge,
    wall: Arc<dyn WallClock>,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<ClockSnapshot>,
    notices: broadcast::Sender<Notice>,
    /// Set while local storage writes are failing, so the user hears about
    /// it once rather than on every tick.
    storage_failing: bool,
}

impl ClockService {
    /// Restore the clock from storage and build the service with its
    /// handle. Nothing runs until [`run`](Self::run) is awaited, so
    /// callers can subscribe to notices first.
    pub fn new(
        bridge: PersistenceBridge,
        wall: Arc<dyn WallClock>,
        tick: &TickConfig,
    ) -> (Self, ClockHandle) {
        let state = ClockState::restore(bridge.load(), wall.now());
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (snapshots, snapshot_rx) = watch::channel(ClockSnapshot::of(&state));
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        let handle = ClockHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            notices: notices.clone(),
        };
        let service = Self {
            state,
            scheduler: TickScheduler::from_config(tick),
            bridge,
            wall,
            commands,
            snapshots,
            notices,
            storage_failing: false,
        };
        (service, handle)
    }

    /// Build the service and run it on a new task.
    pub fn spawn(
        bridge: PersistenceBridge,
        wall: Arc<dyn WallClock>,
        tick: &TickConfig,
    ) -> (ClockHandle, JoinHandle<()>) {
        let (service, handle) = Self::new(bridge, wall, tick);
        (handle, tokio::spawn(service.run()))
    }

    /// Process commands and ticks until shut down or every handle is
    /// dropped.
    pub async fn run(mut self) {
        info!(
            mode = ?self.state.mode(),
            effective = %self.state.effective_time(),
            authority = self.bridge.authority().name(),
            period = ?self.scheduler.period(),
            "clock service started"
        );
        if self.state.mode() == ClockMode::Virtual {
            let message = format!(
                "Virtual time restored: {}",
                self.state.effective_time().format(DISPLAY_FORMAT)
            );
            self.notify(Notice::info(message, self.wall.now()));
        }
        self.sync_scheduler();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                () = self.scheduler.next_tick() => self.on_tick(),
            }
        }

        self.scheduler.stop();
        info!(effective = %self.state.effective_time(), "clock service stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Transition { request, reply } => {
                let result = self.transition(request);
                if let Err(e) = &result {
                    debug!(?request, error = %e, "request rejected");
                }
                if reply.send(result).is_err() {
                    debug!(?request, "requester went away before the reply");
                }
            }
            Command::Remote { reply } => {
                let bridge = self.bridge.clone();
                tokio::spawn(async move {
                    let result = bridge.fetch_remote().await.map_err(ServiceError::from);
                    if reply.send(result).is_err() {
                        debug!("remote time requester went away");
                    }
                });
            }
            Command::Shutdown => {}
        }
    }

    fn transition(&mut self, request: Request) -> Result<ClockSnapshot, ServiceError> {
        let now = self.wall.now();
        let effects = match request {
            Request::EnterEditing => self.state.enter_editing()?,
            Request::DigitEdit(op) => self.state.apply_digit_edit(op)?,
            Request::Commit => self.state.commit()?,
            Request::Cancel => self.state.cancel_editing(now)?,
            Request::PickDate(date) => self.state.pick_date(date)?,
            Request::PickTime(time) => self.state.pick_time(time)?,
            Request::SetVirtual(value) => self.state.set_virtual(value)?,
            Request::RevertToReal => self.state.revert_to_real(now),
        };
        debug!(
            ?request,
            phase = ?self.state.phase(),
            effective = %self.state.effective_time(),
            "transition applied"
        );
        self.apply(effects);
        self.sync_scheduler();
        Ok(self.publish())
    }

    fn on_tick(&mut self) {
        let effects = self.state.tick(self.wall.now());
        self.apply(effects);
        self.publish();
    }

    /// Re-arm the timer when the new state ticks, disarm it otherwise.
    fn sync_scheduler(&mut self) {
        if self.state.is_ticking() {
            self.scheduler.start();
        } else {
            self.scheduler.stop();
        }
    }

    fn publish(&self) -> ClockSnapshot {
        let snapshot = ClockSnapshot::of(&self.state);
        self.snapshots.send_replace(snapshot);
        snapshot
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Persist(value) => {
                    let result = self
                        .bridge
                        .save(value)
                        .map_err(|e| format!("Could not save virtual time: {e}"));
                    self.record_storage(result);
                }
                Effect::ClearPersisted => {
                    let result = self
                        .bridge
                        .clear()
                        .map_err(|e| format!("Could not clear virtual time: {e}"));
                    self.record_storage(result);
                }
                Effect::PushVirtual(value) => self.push_remote(Some(value)),
                Effect::PushReal => self.push_remote(None),
            }
        }
    }

    fn record_storage(&mut self, result: Result<(), String>) {
        match result {
            Ok(()) => {
                if self.storage_failing {
                    info!("local storage writable again");
                    self.storage_failing = false;
                }
            }
            Err(message) => {
                warn!(error = %message, "local storage write failed");
                if !self.storage_failing {
                    self.storage_failing = true;
                    self.notify(Notice::warning(message, self.wall.now()));
                }
            }
        }
    }

    /// Tell the remote authority about the new mode without waiting.
    /// `None` means real time.
    fn push_remote(&self, target: Option<NaiveDateTime>) {
        let bridge = self.bridge.clone();
        let notices = self.notices.clone();
        let wall = Arc::clone(&self.wall);
        tokio::spawn(async move {
            let result = match target {
                Some(value) => bridge.push_remote(value).await,
                None => bridge.push_real_mode().await,
            };
            match result {
                Ok(()) => debug!(
                    ?target,
                    authority = bridge.authority().name(),
                    "remote authority updated"
                ),
                Err(e) => {
                    warn!(?target, error = %e, "failed to update remote time authority");
                    let message = format!("Server clock not updated: {e}");
                    notify::publish(&notices, Notice::warning(message, wall.now()));
                }
            }
        });
    }

    fn notify(&self, notice: Notice) {
        let receivers = notify::publish(&self.notices, notice);
        debug!(receivers, "notice published");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn snapshot_display_shows_odometer_and_mode() {
        let real = ClockSnapshot::of(&ClockState::real(at("2024-03-10T10:00:00")));
        assert_eq!(real.to_string(), "03/10/2024 10:00:00 (real)");
        assert!(!real.is_virtual());

        let mut state = ClockState::real(at("2024-03-10T10:00:00"));
        state.set_virtual(at("2030-01-01T00:00:05")).unwrap();
        let virtual_time = ClockSnapshot::of(&state);
        assert_eq!(virtual_time.to_string(), "01/01/2030 00:00:05 (virtual)");

        state.enter_editing().unwrap();
        assert_eq!(
            ClockSnapshot::of(&state).to_string(),
            "01/01/2030 00:00:05 (editing)"
        );
    }

    #[test]
    fn snapshot_falls_back_when_year_has_no_wheel() {
        let snapshot = ClockSnapshot::of(&ClockState::real(at("0999-12-31T23:59:59")));
        assert_eq!(snapshot.digits, None);
        assert_eq!(snapshot.to_string(), "12/31/0999 23:59:59 (real)");
    }

    #[test]
    fn snapshot_serializes_mode_phase_and_wheel() {
        let mut state = ClockState::real(at("2024-03-10T10:00:00"));
        state.enter_editing().unwrap();
        let json = serde_json::to_value(ClockSnapshot::of(&state)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "mode": "virtual",
                "phase": "virtual_editing",
                "effective": "2024-03-10T10:00:00",
                "digits": [0, 3, 1, 0, 2, 0, 2, 4, 1, 0, 0, 0, 0, 0],
            })
        );

        let off_wheel = ClockSnapshot::of(&ClockState::real(at("0999-12-31T23:59:59")));
        assert_eq!(
            serde_json::to_value(off_wheel).unwrap(),
            serde_json::json!({
                "mode": "real",
                "phase": "real_ticking",
                "effective": "0999-12-31T23:59:59",
                "digits": null,
            })
        );
    }

    #[test]
    fn deadlines_compare_against_effective_time() {
        let snapshot = ClockSnapshot::of(&ClockState::real(at("2024-06-10T10:00:00")));
        assert!(snapshot.has_passed(at("2024-06-10T09:59:59")));
        assert!(!snapshot.has_passed(at("2024-06-10T10:00:00")));
        assert!(!snapshot.has_passed(at("2024-06-11T00:00:00")));
    }
}
