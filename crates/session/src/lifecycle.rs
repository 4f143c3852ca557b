//! Wires the coordinator, validator, activity tracker and logout executor
//! together for one host application.

use crate::activity::ActivityTracker;
use crate::config::TimeoutSettings;
use crate::coordinator::{LogoutReason, SessionCoordinator, SessionHooks};
use crate::logout::LogoutExecutor;
use crate::scheduler::Scheduler;
use crate::validator::SessionValidator;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

pub type WarningListener = Arc<dyn Fn(Duration) + Send + Sync>;

struct LifecycleHooks {
    executor: Arc<LogoutExecutor>,
    runtime: Handle,
    warning: Option<WarningListener>,
}

impl SessionHooks for LifecycleHooks {
    fn on_warning(&self, time_remaining: Duration) {
        if let Some(listener) = &self.warning {
            listener(time_remaining);
        }
    }

    fn on_logout(&self, reason: LogoutReason) {
        let executor = Arc::clone(&self.executor);
        self.runtime.spawn(async move {
            if let Some(report) = executor.execute(reason).await {
                debug!(reason = %report.reason, sign_out = ?report.sign_out, "Logout finished");
            }
        });
    }
}

pub struct SessionLifecycle {
    coordinator: SessionCoordinator,
    tracker: ActivityTracker,
    executor: Arc<LogoutExecutor>,
    runtime: Handle,
}

impl fmt::Debug for SessionLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLifecycle")
            .field("coordinator", &self.coordinator)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl SessionLifecycle {
    /// Logout sequences triggered by the coordinator run on `runtime`.
    pub fn new(
        settings: TimeoutSettings,
        scheduler: Arc<dyn Scheduler>,
        executor: Arc<LogoutExecutor>,
        runtime: Handle,
    ) -> Self {
        let hooks = Arc::new(LifecycleHooks {
            executor: Arc::clone(&executor),
            runtime: runtime.clone(),
            warning: None,
        });
        let coordinator = SessionCoordinator::new(settings, scheduler, hooks);
        let tracker = ActivityTracker::new(coordinator.clone());
        Self {
            coordinator,
            tracker,
            executor,
            runtime,
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn SessionValidator>) -> Self {
        self.coordinator = self.coordinator.with_validator(validator);
        self
    }

    /// Called with the time remaining whenever the warning deadline fires.
    #[must_use]
    pub fn on_warning(self, listener: WarningListener) -> Self {
        self.coordinator.set_hooks(Arc::new(LifecycleHooks {
            executor: Arc::clone(&self.executor),
            runtime: self.runtime.clone(),
            warning: Some(listener),
        }));
        self
    }

    pub fn start(&self) {
        self.coordinator.start();
    }

    #[must_use]
    pub const fn coordinator(&self) -> &SessionCoordinator {
        &self.coordinator
    }

    #[must_use]
    pub const fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    #[must_use]
    pub const fn executor(&self) -> &Arc<LogoutExecutor> {
        &self.executor
    }

    pub fn extend(&self) -> bool {
        self.coordinator.extend()
    }

    /// Starts a user-requested logout. Returns false if one was already underway.
    pub fn logout_now(&self) -> bool {
        self.coordinator.request_logout(LogoutReason::UserRequested)
    }

    pub fn shutdown(&self) {
        self.coordinator.shutdown();
    }
}
