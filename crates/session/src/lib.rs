pub mod activity;
pub mod beacon;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod flags;
pub mod lifecycle;
pub mod logout;
pub mod scheduler;
pub mod validator;

// Re-export commonly used types for easier access
pub use activity::{ActivityKind, ActivityOutcome, ActivityTracker};
pub use beacon::{BeaconRequest, BeaconTransport, DetachedTransport, KeepAliveTransport, LogoutBeacon, send_best_effort};
pub use client::SessionClient;
pub use config::{AppConfig, ClientConfig, SessionTimeoutConfig, TimeoutSettings};
pub use coordinator::{LogoutReason, Phase, SessionCoordinator, SessionHooks, SessionSnapshot};
pub use error::{Result, SessionError};
pub use flags::{FileFlagStore, FlagStore, MemoryFlagStore, SessionFlags};
pub use lifecycle::{SessionLifecycle, WarningListener};
pub use logout::{ClearUiState, LogoutExecutor, LogoutReport, Navigator, SignOutClient, SignOutOutcome};
pub use scheduler::{ManualScheduler, Scheduler, TimerHandle, TokioScheduler};
pub use validator::{HttpSessionValidator, SessionStatus, SessionValidator};
