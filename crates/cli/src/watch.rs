use crate::WatchArgs;
use casekeep_session::{
    AppConfig, BeaconRequest, BeaconTransport, DetachedTransport, HttpSessionValidator, KeepAliveTransport,
    LogoutBeacon, LogoutExecutor, SessionClient, SessionFlags, SessionLifecycle, SessionStatus, TokioScheduler,
};
use casekeep_ui::{App, AppExit, ChannelNavigator, warning_listener};
use color_eyre::Result;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Why the watch session did not start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    LogoutInProgress,
    NotSignedIn { sign_in: String },
}

/// Everything needed to run the session screen and to tear it down afterwards.
pub struct WatchSession {
    pub app: App,
    lifecycle: SessionLifecycle,
    beacon: LogoutBeacon,
    keep_alive: Arc<KeepAliveTransport>,
    flags: SessionFlags,
    config: AppConfig,
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("lifecycle", &self.lifecycle)
            .field("beacon", &self.beacon)
            .finish_non_exhaustive()
    }
}

/// Bootstraps a watched session: refuses to resume a session that is being
/// torn down, checks the session once, then arms the inactivity timers.
///
/// # Errors
///
/// Returns an error if the HTTP clients cannot be created or no tokio runtime is running.
pub async fn prepare_watch(
    mut config: AppConfig,
    args: &WatchArgs,
    flags: SessionFlags,
) -> Result<std::result::Result<WatchSession, Refusal>> {
    args.apply(&mut config);
    let token = args.connection.token();

    if flags.logout_in_progress() {
        warn!("Refusing to start while a sign-out is still in progress");
        return Ok(Err(Refusal::LogoutInProgress));
    }

    let client = SessionClient::new(config.client.clone(), token)?;
    let result = client.who_am_i().await;
    match (SessionStatus::from_result(&result), result) {
        (SessionStatus::Invalid, _) => {
            flags.clear_authenticated();
            return Ok(Err(Refusal::NotSignedIn {
                sign_in: client.sign_in_url(),
            }));
        }
        (SessionStatus::Valid, Err(e)) => warn!("Initial session check failed, continuing: {}", e),
        (SessionStatus::Valid, Ok(())) => {}
    }
    flags.mark_authenticated();

    let (tx, rx) = mpsc::unbounded_channel();
    let executor = LogoutExecutor::builder(
        Arc::new(client.clone()),
        Arc::new(ChannelNavigator::new(tx.clone())),
        flags.clone(),
        client.sign_in_url(),
    )
    .sign_out_timeout(config.client.sign_out_timeout())
    .flag_clear_grace(config.client.flag_clear_grace())
    .build();

    let lifecycle = SessionLifecycle::new(
        config.timeout_settings(),
        Arc::new(TokioScheduler::current()?),
        Arc::new(executor),
        Handle::current(),
    )
    .with_validator(Arc::new(HttpSessionValidator::new(client.clone())))
    .on_warning(warning_listener(tx));
    lifecycle.start();

    let keep_alive = Arc::new(KeepAliveTransport::new(config.client.sign_out_timeout())?);
    let transports: Vec<Arc<dyn BeaconTransport>> = vec![
        keep_alive.clone(),
        Arc::new(DetachedTransport::new(config.client.sign_out_timeout())),
    ];
    let beacon = LogoutBeacon::new(transports, flags.clone(), BeaconRequest::sign_out(&client));

    let app = App::new(
        lifecycle.coordinator().clone(),
        lifecycle.tracker().clone(),
        rx,
        config.client.base_url.clone(),
    );
    info!(base_url = %config.client.base_url, "Watching session");

    Ok(Ok(WatchSession {
        app,
        lifecycle,
        beacon,
        keep_alive,
        flags,
        config,
    }))
}

impl WatchSession {
    /// Tears the session down after the UI loop ended.
    ///
    /// Quitting the screen is treated like closing the page: the beacon signs
    /// the user out unless a logout already ran.
    ///
    /// A logout still running when the screen closes is given its sign-out
    /// ceiling and grace delay, then the in-progress marker is cleared before
    /// the runtime goes away.
    pub async fn finish(self, exit: &AppExit) {
        let logout_started = self.lifecycle.coordinator().is_logging_out() || self.lifecycle.executor().has_started();
        self.lifecycle.shutdown();
        match exit {
            AppExit::Quit if logout_started => {
                let client = &self.config.client;
                tokio::time::sleep(client.sign_out_timeout() + client.flag_clear_grace()).await;
                self.flags.set_logout_in_progress(false);
                println!("🔒 Signed out.");
            }
            AppExit::Quit => {
                if self.beacon.on_page_hide() {
                    self.keep_alive.flush(self.config.client.sign_out_timeout()).await;
                }
                println!("👋 Session closed.");
            }
            AppExit::SignedOut { target } => {
                tokio::time::sleep(self.config.client.flag_clear_grace()).await;
                self.flags.set_logout_in_progress(false);
                println!("🔒 Signed out. Sign in again at {target}");
            }
        }
    }
}

impl Refusal {
    pub fn report(&self) {
        match self {
            Refusal::LogoutInProgress => {
                eprintln!("❌ A sign-out is still in progress. Try again in a moment.");
            }
            Refusal::NotSignedIn { sign_in } => {
                eprintln!("❌ You are not signed in. Sign in at {sign_in}");
            }
        }
    }
}
