//! Inactivity timers for a signed-in session.
//!
//! The coordinator owns two deadlines (warning and logout) plus a periodic
//! session check. Activity re-arms both deadlines until the warning has been
//! shown; from then on only an explicit extend or logout leaves the warning.
//! Entering logout is a one-way latch that cancels every outstanding timer.

use crate::activity::{ActivityKind, ActivityOutcome};
use crate::config::TimeoutSettings;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::validator::{SessionStatus, SessionValidator};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created but never enabled
    Idle,
    Armed,
    Warning,
    LoggingOut,
    Disabled,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Armed => "armed",
            Phase::Warning => "warning",
            Phase::LoggingOut => "logging out",
            Phase::Disabled => "disabled",
        }
    }

    /// Whether deadlines and session checks are running.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Phase::Armed | Phase::Warning)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    InactivityTimeout,
    SessionInvalid,
    UserRequested,
    /// The warning window was not shorter than the logout window
    Misconfigured,
}

impl LogoutReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LogoutReason::InactivityTimeout => "inactivity timeout",
            LogoutReason::SessionInvalid => "session invalidated by server",
            LogoutReason::UserRequested => "user requested",
            LogoutReason::Misconfigured => "timeout misconfiguration",
        }
    }
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callbacks the host application receives from the coordinator.
///
/// Hooks are invoked without any coordinator lock held, so they may call
/// back into the coordinator (for example `extend` from `on_warning`).
pub trait SessionHooks: Send + Sync {
    fn on_warning(&self, time_remaining: Duration);

    fn on_logout(&self, reason: LogoutReason);
}

/// Point-in-time view of the coordinator for display purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub warning_shown: bool,
    pub logging_out: bool,
    pub time_remaining: Duration,
    pub idle_for: Duration,
    pub last_activity: Option<ActivityKind>,
    pub settings: TimeoutSettings,
}

struct TimerState {
    settings: TimeoutSettings,
    hooks: Arc<dyn SessionHooks>,
    validator: Option<Arc<dyn SessionValidator>>,
    phase: Phase,
    warning_timer: Option<TimerHandle>,
    logout_timer: Option<TimerHandle>,
    poll_timer: Option<TimerHandle>,
    warning_shown: bool,
    logging_out: bool,
    torn_down: bool,
    last_activity_at: Duration,
    last_activity: Option<ActivityKind>,
    generation: u64,
}

impl TimerState {
    fn cancel_deadlines(&mut self) {
        for timer in [self.warning_timer.take(), self.logout_timer.take()].into_iter().flatten() {
            timer.cancel();
        }
        // Anything already queued from the previous cycle is now stale
        self.generation = self.generation.wrapping_add(1);
    }

    fn cancel_all(&mut self) {
        self.cancel_deadlines();
        if let Some(poll) = self.poll_timer.take() {
            poll.cancel();
        }
    }

    fn latch_logout(&mut self, reason: LogoutReason) -> Notify {
        self.logging_out = true;
        self.phase = Phase::LoggingOut;
        self.cancel_all();
        info!(%reason, "Session logout triggered");
        Notify::Logout(Arc::clone(&self.hooks), reason)
    }
}

/// Hook invocation deferred until the state lock is released.
enum Notify {
    Nothing,
    Warning(Arc<dyn SessionHooks>, Duration),
    Logout(Arc<dyn SessionHooks>, LogoutReason),
}

impl Notify {
    fn deliver(self) {
        match self {
            Notify::Nothing => {}
            Notify::Warning(hooks, remaining) => hooks.on_warning(remaining),
            Notify::Logout(hooks, reason) => hooks.on_logout(reason),
        }
    }
}

struct Shared {
    scheduler: Arc<dyn Scheduler>,
    check_in_flight: AtomicBool,
    state: Mutex<TimerState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn arm(self: &Arc<Self>, state: &mut TimerState) {
        state.cancel_deadlines();
        state.warning_shown = false;
        state.phase = Phase::Armed;
        state.last_activity_at = self.scheduler.now();

        let generation = state.generation;
        let weak = Arc::downgrade(self);
        state.warning_timer = Some(self.scheduler.schedule(
            state.settings.warning_time,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_warning_deadline(generation);
                }
            }),
        ));
        // Backup deadline in case the warning never gets to run
        state.logout_timer = Some(self.schedule_logout(state.settings.logout_time, generation));
    }

    fn schedule_logout(self: &Arc<Self>, delay: Duration, generation: u64) -> TimerHandle {
        let weak = Arc::downgrade(self);
        self.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_logout_deadline(generation);
                }
            }),
        )
    }

    fn start_polling(self: &Arc<Self>, state: &mut TimerState) {
        if state.poll_timer.is_some() || state.validator.is_none() || state.settings.session_check_interval.is_zero()
        {
            return;
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        state.poll_timer = Some(self.scheduler.schedule_repeating(
            state.settings.session_check_interval,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.poll_session();
                }
            }),
        ));
    }

    fn enable(self: &Arc<Self>) {
        let mut state = self.lock();
        state.settings.enabled = true;
        if state.logging_out || state.torn_down || state.phase.is_active() {
            return;
        }
        if let Err(e) = state.settings.validate() {
            warn!("Inactivity tracking not started: {}", e);
            state.phase = Phase::Disabled;
            return;
        }
        self.arm(&mut state);
        self.start_polling(&mut state);
        info!(
            warning = ?state.settings.warning_time,
            logout = ?state.settings.logout_time,
            "Inactivity tracking armed"
        );
    }

    fn disable(&self, tear_down: bool) {
        let mut state = self.lock();
        state.settings.enabled = false;
        state.torn_down |= tear_down;
        state.cancel_all();
        state.warning_shown = false;
        if !state.logging_out && state.phase != Phase::Disabled {
            state.phase = Phase::Disabled;
            info!("Inactivity tracking disabled");
        }
    }

    fn reset(self: &Arc<Self>, activity: Option<ActivityKind>) -> ActivityOutcome {
        let mut state = self.lock();
        if state.logging_out || !state.phase.is_active() {
            return ActivityOutcome::IgnoredInactive;
        }
        if activity.is_some() {
            if state.warning_shown {
                return ActivityOutcome::IgnoredWarningShown;
            }
            state.last_activity = activity;
        }
        self.arm(&mut state);
        debug!("Inactivity timers reset");
        ActivityOutcome::Reset
    }

    fn on_warning_deadline(self: &Arc<Self>, generation: u64) {
        let notify = {
            let mut state = self.lock();
            if state.generation != generation || state.logging_out || state.phase != Phase::Armed {
                return;
            }
            let remaining = state.settings.warning_window();
            if remaining.is_zero() {
                warn!("Warning window is empty; logging out at the warning deadline");
                state.latch_logout(LogoutReason::Misconfigured)
            } else if state.warning_shown {
                Notify::Nothing
            } else {
                state.warning_shown = true;
                state.phase = Phase::Warning;
                state.warning_timer = None;
                if let Some(stale) = state.logout_timer.take() {
                    stale.cancel();
                }
                state.logout_timer = Some(self.schedule_logout(remaining, generation));
                info!(remaining = ?remaining, "Session inactivity warning");
                Notify::Warning(Arc::clone(&state.hooks), remaining)
            }
        };
        notify.deliver();
    }

    fn on_logout_deadline(&self, generation: u64) {
        let notify = {
            let mut state = self.lock();
            if state.generation != generation || state.logging_out || !state.phase.is_active() {
                return;
            }
            state.latch_logout(LogoutReason::InactivityTimeout)
        };
        notify.deliver();
    }

    fn request_logout(&self, reason: LogoutReason) -> bool {
        let notify = {
            let mut state = self.lock();
            if state.logging_out || state.torn_down {
                return false;
            }
            if reason == LogoutReason::SessionInvalid && !state.phase.is_active() {
                return false;
            }
            state.latch_logout(reason)
        };
        notify.deliver();
        true
    }

    fn poll_session(self: &Arc<Self>) {
        let validator = {
            let state = self.lock();
            if state.logging_out || !state.phase.is_active() {
                return;
            }
            match &state.validator {
                Some(validator) => Arc::clone(validator),
                None => return,
            }
        };

        if self.check_in_flight.swap(true, Ordering::SeqCst) {
            debug!("Previous session check still running; skipping this tick");
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime available for the session check");
            self.check_in_flight.store(false, Ordering::SeqCst);
            return;
        };

        let weak = Arc::downgrade(self);
        runtime.spawn(async move {
            let status = validator.check().await;
            if let Some(shared) = weak.upgrade() {
                shared.check_in_flight.store(false, Ordering::SeqCst);
                if status == SessionStatus::Invalid {
                    shared.request_logout(LogoutReason::SessionInvalid);
                }
            }
        });
    }

    fn time_remaining(&self, state: &TimerState) -> Duration {
        let idle_for = self.scheduler.now().saturating_sub(state.last_activity_at);
        state.settings.logout_time.saturating_sub(idle_for)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.cancel_all();
    }
}

/// Handle to a session's inactivity coordinator. Clones share the same state;
/// dropping the last clone cancels every timer.
#[derive(Clone)]
pub struct SessionCoordinator {
    shared: Arc<Shared>,
}

impl fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("SessionCoordinator")
            .field("phase", &snapshot.phase)
            .field("warning_shown", &snapshot.warning_shown)
            .field("time_remaining", &snapshot.time_remaining)
            .finish_non_exhaustive()
    }
}

impl SessionCoordinator {
    pub fn new(settings: TimeoutSettings, scheduler: Arc<dyn Scheduler>, hooks: Arc<dyn SessionHooks>) -> Self {
        let last_activity_at = scheduler.now();
        Self {
            shared: Arc::new(Shared {
                scheduler,
                check_in_flight: AtomicBool::new(false),
                state: Mutex::new(TimerState {
                    settings,
                    hooks,
                    validator: None,
                    phase: Phase::Idle,
                    warning_timer: None,
                    logout_timer: None,
                    poll_timer: None,
                    warning_shown: false,
                    logging_out: false,
                    torn_down: false,
                    last_activity_at,
                    last_activity: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Attaches the server-side session check polled while the coordinator is armed.
    #[must_use]
    pub fn with_validator(self, validator: Arc<dyn SessionValidator>) -> Self {
        self.shared.lock().validator = Some(validator);
        self
    }

    /// Arms the coordinator if its settings are enabled, otherwise leaves it disabled.
    pub fn start(&self) {
        let enabled = self.shared.lock().settings.enabled;
        self.set_enabled(enabled);
    }

    pub fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.shared.enable();
        } else {
            self.shared.disable(false);
        }
    }

    /// Cancels every timer permanently. No hook fires after this returns.
    pub fn shutdown(&self) {
        self.shared.disable(true);
    }

    /// Re-arms both deadlines from now. No-op while disabled or logging out.
    pub fn reset_timers(&self) -> bool {
        self.shared.reset(None) == ActivityOutcome::Reset
    }

    /// Leaves the warning state by explicit user decision.
    pub fn extend(&self) -> bool {
        let extended = self.reset_timers();
        if extended {
            info!("Session extended by user");
        }
        extended
    }

    /// Records user interaction. Ignored once the warning is showing.
    pub fn record_activity(&self, kind: ActivityKind) -> ActivityOutcome {
        self.shared.reset(Some(kind))
    }

    /// Enters logout unless it has already started. Returns whether this call
    /// was the one that triggered it.
    pub fn request_logout(&self, reason: LogoutReason) -> bool {
        self.shared.request_logout(reason)
    }

    /// Replaces the settings in place, re-arming when the coordinator is running.
    pub fn reconfigure(&self, settings: TimeoutSettings) {
        let mut state = self.shared.lock();
        state.settings = settings;
        if !state.phase.is_active() || state.logging_out {
            return;
        }
        drop(state);

        if !settings.enabled {
            self.shared.disable(false);
            return;
        }

        let mut state = self.shared.lock();
        if let Some(poll) = state.poll_timer.take() {
            poll.cancel();
        }
        if let Err(e) = settings.validate() {
            warn!("Rejected reconfiguration: {}", e);
            drop(state);
            self.shared.disable(false);
            return;
        }
        self.shared.arm(&mut state);
        self.shared.start_polling(&mut state);
        debug!("Inactivity settings reconfigured");
    }

    pub fn set_hooks(&self, hooks: Arc<dyn SessionHooks>) {
        self.shared.lock().hooks = hooks;
    }

    /// `max(0, logout_time - idle time)`; never negative and non-increasing between resets.
    #[must_use]
    pub fn time_remaining(&self) -> Duration {
        let state = self.shared.lock();
        self.shared.time_remaining(&state)
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    #[must_use]
    pub fn is_warning_shown(&self) -> bool {
        self.shared.lock().warning_shown
    }

    #[must_use]
    pub fn is_logging_out(&self) -> bool {
        self.shared.lock().logging_out
    }

    #[must_use]
    pub fn settings(&self) -> TimeoutSettings {
        self.shared.lock().settings
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.shared.lock();
        SessionSnapshot {
            phase: state.phase,
            warning_shown: state.warning_shown,
            logging_out: state.logging_out,
            time_remaining: self.shared.time_remaining(&state),
            idle_for: self.shared.scheduler.now().saturating_sub(state.last_activity_at),
            last_activity: state.last_activity,
            settings: state.settings,
        }
    }
}
