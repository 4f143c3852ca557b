use crate::coordinator::SessionCoordinator;
use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// User interactions that count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    PointerDown,
    PointerMove,
    KeyPress,
    Scroll,
    TouchStart,
    Click,
    KeyDown,
}

impl ActivityKind {
    pub const RECOGNIZED: [ActivityKind; 7] = [
        ActivityKind::PointerDown,
        ActivityKind::PointerMove,
        ActivityKind::KeyPress,
        ActivityKind::Scroll,
        ActivityKind::TouchStart,
        ActivityKind::Click,
        ActivityKind::KeyDown,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ActivityKind::PointerDown => "pointerdown",
            ActivityKind::PointerMove => "pointermove",
            ActivityKind::KeyPress => "keypress",
            ActivityKind::Scroll => "scroll",
            ActivityKind::TouchStart => "touchstart",
            ActivityKind::Click => "click",
            ActivityKind::KeyDown => "keydown",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::RECOGNIZED
            .into_iter()
            .find(|kind| kind.as_str() == needle)
            .ok_or_else(|| SessionError::Config(format!("unrecognized activity event: {s}")))
    }
}

/// What the coordinator did with an activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// Deadlines were re-armed
    Reset,
    /// The warning is showing; only extend or logout may leave it
    IgnoredWarningShown,
    /// Disabled, idle or already logging out
    IgnoredInactive,
}

/// Feeds user interaction into the coordinator.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    coordinator: SessionCoordinator,
}

impl ActivityTracker {
    #[must_use]
    pub const fn new(coordinator: SessionCoordinator) -> Self {
        Self { coordinator }
    }

    pub fn notify(&self, kind: ActivityKind) -> ActivityOutcome {
        let outcome = self.coordinator.record_activity(kind);
        trace!(%kind, ?outcome, "Activity observed");
        outcome
    }

    /// Listens on `events` until every sender is dropped.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn spawn(self, mut events: mpsc::UnboundedReceiver<ActivityKind>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(kind) = events.recv().await {
                self.notify(kind);
            }
            debug!("Activity listener detached");
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::TimeoutSettings;
    use crate::coordinator::{LogoutReason, Phase, SessionHooks};
    use crate::scheduler::ManualScheduler;
    use std::sync::Arc;
    use std::time::Duration;

    struct NoopHooks;

    impl SessionHooks for NoopHooks {
        fn on_warning(&self, _time_remaining: Duration) {}
        fn on_logout(&self, _reason: LogoutReason) {}
    }

    fn armed_tracker() -> (Arc<ManualScheduler>, SessionCoordinator, ActivityTracker) {
        let scheduler = Arc::new(ManualScheduler::new());
        let coordinator = SessionCoordinator::new(
            TimeoutSettings::from_millis(1_000, 3_000, 0),
            scheduler.clone(),
            Arc::new(NoopHooks),
        );
        coordinator.start();
        let tracker = ActivityTracker::new(coordinator.clone());
        (scheduler, coordinator, tracker)
    }

    #[test]
    fn test_event_names_round_trip() {
        for kind in ActivityKind::RECOGNIZED {
            assert_eq!(kind.as_str().parse::<ActivityKind>().unwrap(), kind);
        }
        assert_eq!(" KeyDown ".parse::<ActivityKind>().unwrap(), ActivityKind::KeyDown);
        assert!("wheel".parse::<ActivityKind>().is_err());
    }

    #[test]
    fn test_notify_resets_until_warning() {
        let (scheduler, coordinator, tracker) = armed_tracker();

        scheduler.advance(Duration::from_millis(800));
        assert_eq!(tracker.notify(ActivityKind::Scroll), ActivityOutcome::Reset);
        assert_eq!(coordinator.time_remaining(), Duration::from_secs(3));
        assert_eq!(coordinator.snapshot().last_activity, Some(ActivityKind::Scroll));

        scheduler.advance(Duration::from_millis(1_000));
        assert_eq!(coordinator.phase(), Phase::Warning);
        assert_eq!(
            tracker.notify(ActivityKind::KeyPress),
            ActivityOutcome::IgnoredWarningShown
        );
        assert_eq!(coordinator.snapshot().last_activity, Some(ActivityKind::Scroll));
    }

    #[test]
    fn test_notify_ignored_when_disabled() {
        let (_scheduler, coordinator, tracker) = armed_tracker();
        coordinator.set_enabled(false);
        assert_eq!(tracker.notify(ActivityKind::Click), ActivityOutcome::IgnoredInactive);
    }

    #[tokio::test]
    async fn test_spawned_listener_drains_channel() {
        let (scheduler, coordinator, tracker) = armed_tracker();
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = tracker.spawn(rx);

        scheduler.advance(Duration::from_millis(900));
        tx.send(ActivityKind::TouchStart).unwrap();
        drop(tx);
        listener.await.unwrap();

        assert_eq!(coordinator.time_remaining(), Duration::from_secs(3));
        assert_eq!(coordinator.snapshot().last_activity, Some(ActivityKind::TouchStart));
    }
}
