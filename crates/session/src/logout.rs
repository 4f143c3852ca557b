use crate::client::SessionClient;
use crate::coordinator::LogoutReason;
use crate::error::Result;
use crate::flags::SessionFlags;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_SIGN_OUT_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_FLAG_CLEAR_GRACE: Duration = Duration::from_secs(1);

#[async_trait]
pub trait SignOutClient: Send + Sync {
    async fn sign_out(&self) -> Result<()>;
}

#[async_trait]
impl SignOutClient for SessionClient {
    async fn sign_out(&self) -> Result<()> {
        SessionClient::sign_out(self).await
    }
}

/// Leaves the signed-in surface entirely, discarding any in-memory state.
pub trait Navigator: Send + Sync {
    fn force_navigate(&self, target: &str);
}

pub type ClearUiState = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutOutcome {
    Completed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutReport {
    pub reason: LogoutReason,
    pub sign_out: SignOutOutcome,
    pub target: String,
    pub completed_at: DateTime<Utc>,
}

/// Runs the sign-out sequence once. Every network step degrades to "carry on";
/// the forced navigation always happens.
pub struct LogoutExecutor {
    sign_out: Arc<dyn SignOutClient>,
    navigator: Arc<dyn Navigator>,
    flags: SessionFlags,
    clear_ui_state: Option<ClearUiState>,
    sign_in_target: String,
    sign_out_timeout: Duration,
    flag_clear_grace: Duration,
    started: AtomicBool,
}

impl fmt::Debug for LogoutExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogoutExecutor")
            .field("sign_in_target", &self.sign_in_target)
            .field("sign_out_timeout", &self.sign_out_timeout)
            .field("flag_clear_grace", &self.flag_clear_grace)
            .field("started", &self.has_started())
            .finish_non_exhaustive()
    }
}

pub struct LogoutExecutorBuilder {
    sign_out: Arc<dyn SignOutClient>,
    navigator: Arc<dyn Navigator>,
    flags: SessionFlags,
    sign_in_target: String,
    clear_ui_state: Option<ClearUiState>,
    sign_out_timeout: Duration,
    flag_clear_grace: Duration,
}

impl LogoutExecutorBuilder {
    #[must_use]
    pub fn clear_ui_state(mut self, clear: ClearUiState) -> Self {
        self.clear_ui_state = Some(clear);
        self
    }

    #[must_use]
    pub const fn sign_out_timeout(mut self, timeout: Duration) -> Self {
        self.sign_out_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn flag_clear_grace(mut self, grace: Duration) -> Self {
        self.flag_clear_grace = grace;
        self
    }

    #[must_use]
    pub fn build(self) -> LogoutExecutor {
        LogoutExecutor {
            sign_out: self.sign_out,
            navigator: self.navigator,
            flags: self.flags,
            clear_ui_state: self.clear_ui_state,
            sign_in_target: self.sign_in_target,
            sign_out_timeout: self.sign_out_timeout,
            flag_clear_grace: self.flag_clear_grace,
            started: AtomicBool::new(false),
        }
    }
}

impl LogoutExecutor {
    pub fn builder(
        sign_out: Arc<dyn SignOutClient>,
        navigator: Arc<dyn Navigator>,
        flags: SessionFlags,
        sign_in_target: impl Into<String>,
    ) -> LogoutExecutorBuilder {
        LogoutExecutorBuilder {
            sign_out,
            navigator,
            flags,
            sign_in_target: sign_in_target.into(),
            clear_ui_state: None,
            sign_out_timeout: DEFAULT_SIGN_OUT_TIMEOUT,
            flag_clear_grace: DEFAULT_FLAG_CLEAR_GRACE,
        }
    }

    #[must_use]
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    #[must_use]
    pub const fn flags(&self) -> &SessionFlags {
        &self.flags
    }

    /// Signs the user out. Returns `None` if a logout already ran on this executor.
    ///
    /// The logout-in-progress flag is cleared on a detached task after the
    /// grace delay, so this must run inside a tokio runtime.
    pub async fn execute(&self, reason: LogoutReason) -> Option<LogoutReport> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!(%reason, "Logout already in progress");
            return None;
        }
        info!(%reason, "Signing out");

        if let Some(clear) = &self.clear_ui_state {
            clear();
        }
        self.flags.set_logout_in_progress(true);
        self.flags.clear_authenticated();

        let sign_out = match tokio::time::timeout(self.sign_out_timeout, self.sign_out.sign_out()).await {
            Ok(Ok(())) => SignOutOutcome::Completed,
            Ok(Err(e)) => {
                warn!("Sign-out request failed, continuing locally: {}", e);
                SignOutOutcome::Failed
            }
            Err(_) => {
                warn!(timeout = ?self.sign_out_timeout, "Sign-out request timed out, continuing locally");
                SignOutOutcome::TimedOut
            }
        };

        let flags = self.flags.clone();
        let grace = self.flag_clear_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            flags.set_logout_in_progress(false);
            debug!("Logout-in-progress flag cleared");
        });

        self.navigator.force_navigate(&self.sign_in_target);

        Some(LogoutReport {
            reason,
            sign_out,
            target: self.sign_in_target.clone(),
            completed_at: Utc::now(),
        })
    }
}
