use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MILLIS_PER_MINUTE: u64 = 60_000;

/// App-wide inactivity settings, expressed in minutes as configured by administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTimeoutConfig {
    /// Enable/disable inactivity tracking
    pub enabled: bool,

    /// Idle minutes before the warning dialog is shown
    pub warning_time_minutes: u64,

    /// Idle minutes before the user is signed out
    pub logout_time_minutes: u64,

    /// Minutes between server-side session checks
    pub session_check_interval_minutes: u64,
}

impl Default for SessionTimeoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            warning_time_minutes: 25,
            logout_time_minutes: 30,
            session_check_interval_minutes: 5,
        }
    }
}

/// Millisecond-precision settings consumed by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSettings {
    pub enabled: bool,
    pub warning_time: Duration,
    pub logout_time: Duration,
    pub session_check_interval: Duration,
}

impl TimeoutSettings {
    #[must_use]
    pub const fn from_millis(warning_ms: u64, logout_ms: u64, session_check_interval_ms: u64) -> Self {
        Self {
            enabled: true,
            warning_time: Duration::from_millis(warning_ms),
            logout_time: Duration::from_millis(logout_ms),
            session_check_interval: Duration::from_millis(session_check_interval_ms),
        }
    }

    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Time between the warning and the forced logout. Zero means the
    /// configuration leaves no room for a warning.
    #[must_use]
    pub const fn warning_window(&self) -> Duration {
        self.logout_time.saturating_sub(self.warning_time)
    }

    /// # Errors
    ///
    /// Returns an error if the logout window is zero. A warning window that is
    /// not shorter than the logout window is accepted and handled at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.logout_time.is_zero() {
            return Err(SessionError::Config("logout time must be greater than zero".to_string()));
        }
        Ok(())
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self::from(&SessionTimeoutConfig::default())
    }
}

impl From<&SessionTimeoutConfig> for TimeoutSettings {
    fn from(config: &SessionTimeoutConfig) -> Self {
        let to_duration = |minutes: u64| Duration::from_millis(minutes.saturating_mul(MILLIS_PER_MINUTE));
        Self {
            enabled: config.enabled,
            warning_time: to_duration(config.warning_time_minutes),
            logout_time: to_duration(config.logout_time_minutes),
            session_check_interval: to_duration(config.session_check_interval_minutes),
        }
    }
}

/// Where the portal lives and how its session endpoints are reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub who_am_i_path: String,
    pub sign_out_path: String,
    pub sign_in_path: String,

    /// Ceiling for the sign-out call during logout
    pub sign_out_timeout_ms: u64,

    /// Delay before the logout-in-progress flag is cleared
    pub flag_clear_grace_ms: u64,

    /// Ceiling for any other request
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            who_am_i_path: "/api/auth/me".to_string(),
            sign_out_path: "/api/auth/signout".to_string(),
            sign_in_path: "/signin".to_string(),
            sign_out_timeout_ms: 2_000,
            flag_clear_grace_ms: 1_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub const fn sign_out_timeout(&self) -> Duration {
        Duration::from_millis(self.sign_out_timeout_ms)
    }

    #[must_use]
    pub const fn flag_clear_grace(&self) -> Duration {
        Duration::from_millis(self.flag_clear_grace_ms)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Joins `path` onto the base URL without doubling or dropping the slash.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionTimeoutConfig,
    pub client: ClientConfig,
}

impl AppConfig {
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("casekeep")
            .join("config.json")
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Loads the config at `path`, falling back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    #[must_use]
    pub fn timeout_settings(&self) -> TimeoutSettings {
        TimeoutSettings::from(&self.session)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_minutes_convert_to_millis() {
        let config = SessionTimeoutConfig {
            enabled: true,
            warning_time_minutes: 2,
            logout_time_minutes: 3,
            session_check_interval_minutes: 1,
        };
        let settings = TimeoutSettings::from(&config);
        assert_eq!(settings.warning_time, Duration::from_millis(120_000));
        assert_eq!(settings.logout_time, Duration::from_millis(180_000));
        assert_eq!(settings.session_check_interval, Duration::from_millis(60_000));
        assert_eq!(settings.warning_window(), Duration::from_millis(60_000));
    }

    #[test]
    fn test_warning_window_saturates_when_misconfigured() {
        let settings = TimeoutSettings::from_millis(5_000, 3_000, 0);
        assert!(settings.warning_window().is_zero());
        // Misconfiguration degrades at runtime instead of failing validation
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_logout_time_is_rejected() {
        let settings = TimeoutSettings::from_millis(0, 0, 0);
        assert!(matches!(settings.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_url_for_normalises_slashes() {
        let client = ClientConfig {
            base_url: "https://portal.example.com/".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(client.url_for("/api/auth/me"), "https://portal.example.com/api/auth/me");
        assert_eq!(client.url_for("signin"), "https://portal.example.com/signin");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.session.logout_time_minutes = 45;
        config.client.base_url = "https://cases.example.org".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::load_or_default(&temp_dir.path().join("missing.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"session": {"logout_time_minutes": 10}}"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.session.logout_time_minutes, 10);
        assert_eq!(config.session.warning_time_minutes, 25);
        assert_eq!(config.client, ClientConfig::default());
    }
}
