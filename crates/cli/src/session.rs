use casekeep_session::{
    AppConfig, LogoutExecutor, LogoutReason, LogoutReport, Navigator, SessionClient, SessionFlags, SessionStatus,
    SignOutOutcome,
};
use chrono::Local;
use color_eyre::Result;
use std::sync::Arc;

/// There is no page to leave on the command line; tell the user where to go instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintingNavigator;

impl Navigator for PrintingNavigator {
    fn force_navigate(&self, target: &str) {
        println!("🔒 Signed out. Sign in again at {target}");
    }
}

/// One-shot "who am I" check.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be created.
pub async fn check_session(config: &AppConfig, token: Option<String>) -> Result<SessionStatus> {
    let client = SessionClient::new(config.client.clone(), token)?;
    let result = client.who_am_i().await;
    let status = SessionStatus::from_result(&result);
    match (&result, status) {
        (Ok(()), _) => println!("✅ Session is valid ({})", client.who_am_i_url()),
        (Err(e), SessionStatus::Invalid) => {
            println!("❌ Session is not valid: {e}");
            println!("   Sign in at {}", client.sign_in_url());
        }
        (Err(e), SessionStatus::Valid) => println!("⚠️  Could not reach the server, session kept: {e}"),
    }
    Ok(status)
}

/// Runs the full logout sequence once.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be created.
pub async fn sign_out(
    config: &AppConfig,
    token: Option<String>,
    flags: SessionFlags,
    navigator: Arc<dyn Navigator>,
) -> Result<Option<LogoutReport>> {
    let client = SessionClient::new(config.client.clone(), token)?;
    let target = client.sign_in_url();
    let executor = LogoutExecutor::builder(Arc::new(client), navigator, flags, target)
        .sign_out_timeout(config.client.sign_out_timeout())
        .flag_clear_grace(config.client.flag_clear_grace())
        .build();

    let report = executor.execute(LogoutReason::UserRequested).await;
    if let Some(report) = &report {
        match report.sign_out {
            SignOutOutcome::Completed => {}
            SignOutOutcome::Failed => println!("⚠️  The server did not confirm the sign-out; local session cleared"),
            SignOutOutcome::TimedOut => println!("⚠️  The server did not answer in time; local session cleared"),
        }
        println!(
            "   Completed at {}",
            report.completed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
        // Let the in-progress marker expire before the runtime goes away
        tokio::time::sleep(config.client.flag_clear_grace()).await;
        executor.flags().set_logout_in_progress(false);
    }
    Ok(report)
}
