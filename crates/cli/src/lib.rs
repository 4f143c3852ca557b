mod config;
mod logging;
mod session;
mod watch;

pub use crate::config::{ConfigCommand, handle_config_command};
pub use crate::logging::{LogTarget, default_log_path, init_tracing};
pub use crate::session::{PrintingNavigator, check_session, sign_out};
pub use crate::watch::{Refusal, WatchSession, prepare_watch};

use casekeep_session::{AppConfig, FileFlagStore, SessionFlags, SessionStatus};
use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use std::path::PathBuf;
use std::sync::Arc;

pub const TOKEN_ENV: &str = "CASEKEEP_TOKEN";

#[derive(Parser, Debug)]
#[command(
    name = "casekeep",
    version,
    about = "Signs you out of the case portal when you step away",
    long_about = "Casekeep watches a signed-in case portal session from the terminal. After a \
                  period without keyboard or mouse activity it shows a warning with a countdown, \
                  and if nobody answers it signs the session out on the server.\n\n\
                  Quick start:\n\
                  1. casekeep config init        # Write the default configuration\n\
                  2. export CASEKEEP_TOKEN=...   # Your portal session token\n\
                  3. casekeep                    # Watch the session"
)]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "CASEKEEP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(AppConfig::default_path)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Watch the session and sign out after inactivity (default)
    Watch(WatchArgs),

    /// Check once whether the session is still valid
    Check(ConnectionArgs),

    /// Sign out of the portal now
    SignOut(ConnectionArgs),

    /// Show or create the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionArgs {
    /// Portal base URL, e.g. https://cases.example.com
    #[arg(long)]
    pub base_url: Option<String>,

    /// Session token sent as a bearer token
    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,
}

impl ConnectionArgs {
    /// The explicit flag wins over the environment.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .filter(|token| !token.trim().is_empty())
    }

    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(base_url) = &self.base_url {
            config.client.base_url.clone_from(base_url);
        }
    }
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Idle minutes before the warning is shown
    #[arg(long)]
    pub warning_minutes: Option<u64>,

    /// Idle minutes before signing out
    #[arg(long)]
    pub logout_minutes: Option<u64>,

    /// Minutes between server-side session checks (0 disables them)
    #[arg(long)]
    pub check_minutes: Option<u64>,

    /// Keep the session open regardless of inactivity
    #[arg(long)]
    pub no_timeout: bool,
}

impl WatchArgs {
    /// Layers the command-line flags over the file configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        self.connection.apply(config);
        let session = &mut config.session;
        if let Some(minutes) = self.warning_minutes {
            session.warning_time_minutes = minutes;
        }
        if let Some(minutes) = self.logout_minutes {
            session.logout_time_minutes = minutes;
        }
        if let Some(minutes) = self.check_minutes {
            session.session_check_interval_minutes = minutes;
        }
        if self.no_timeout {
            session.enabled = false;
        }
    }
}

/// Shared markers live in the user's data directory so a relaunch sees them.
#[must_use]
pub fn default_flags() -> SessionFlags {
    SessionFlags::new(Arc::new(FileFlagStore::new(FileFlagStore::default_path())))
}

/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: &std::path::Path) -> Result<AppConfig> {
    AppConfig::load_or_default(path).map_err(|e| eyre!("Failed to load configuration from {}: {e}", path.display()))
}

/// Runs every command except `watch`, which needs the terminal.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the command fails.
pub async fn handle_command(cmd: Commands, config_path: &std::path::Path) -> Result<()> {
    match cmd {
        Commands::Watch(_) => Err(eyre!("watch runs the terminal interface and is handled by the binary")),
        Commands::Check(args) => {
            let mut config = load_config(config_path)?;
            args.apply(&mut config);
            match check_session(&config, args.token()).await? {
                SessionStatus::Valid => Ok(()),
                SessionStatus::Invalid => Err(eyre!("session is not valid")),
            }
        }
        Commands::SignOut(args) => {
            let mut config = load_config(config_path)?;
            args.apply(&mut config);
            let report = sign_out(&config, args.token(), default_flags(), Arc::new(PrintingNavigator)).await?;
            if report.is_none() {
                println!("A sign-out is already running.");
            }
            Ok(())
        }
        Commands::Config(cmd) => handle_config_command(&cmd, config_path),
    }
}
