//! Best-effort logout when the host goes away (window closed, process
//! quitting). Independent of the coordinator: it works even if inactivity
//! tracking was never armed.

use crate::client::SessionClient;
use crate::error::{Result, SessionError};
use crate::flags::SessionFlags;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconRequest {
    pub url: String,
    pub bearer: Option<String>,
}

impl BeaconRequest {
    #[must_use]
    pub fn sign_out(client: &SessionClient) -> Self {
        Self {
            url: client.sign_out_url(),
            bearer: client.bearer().map(str::to_string),
        }
    }
}

/// One way of getting a request out without waiting for its answer.
pub trait BeaconTransport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Hands the request off. Must return without blocking on the network.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::TransportUnavailable` when this transport cannot
    /// take the request right now.
    fn dispatch(&self, request: &BeaconRequest) -> Result<()>;
}

/// Sends on the running tokio runtime. In-flight requests can be awaited
/// with [`KeepAliveTransport::flush`] before the runtime shuts down.
pub struct KeepAliveTransport {
    http: reqwest::Client,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for KeepAliveTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeepAliveTransport").finish_non_exhaustive()
    }
}

impl KeepAliveTransport {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            in_flight: Mutex::new(Vec::new()),
        })
    }

    /// Waits up to `ceiling` for dispatched requests to finish.
    pub async fn flush(&self, ceiling: Duration) {
        let pending: Vec<_> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        if pending.is_empty() {
            return;
        }
        let all = async {
            for handle in pending {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(ceiling, all).await.is_err() {
            debug!("Beacon flush ceiling reached with requests still in flight");
        }
    }
}

impl BeaconTransport for KeepAliveTransport {
    fn name(&self) -> &'static str {
        "keep-alive"
    }

    fn dispatch(&self, request: &BeaconRequest) -> Result<()> {
        let runtime = Handle::try_current().map_err(|e| SessionError::TransportUnavailable {
            transport: self.name(),
            reason: e.to_string(),
        })?;

        let mut builder = self.http.post(&request.url);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        let url = request.url.clone();
        let handle = runtime.spawn(async move {
            match builder.send().await {
                Ok(response) => debug!(%url, status = %response.status(), "Logout beacon delivered"),
                Err(e) => debug!(%url, "Logout beacon failed: {}", e),
            }
        });
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        Ok(())
    }
}

/// Fire-and-forget on a detached OS thread. Works without a runtime; the
/// request dies with the process.
#[derive(Debug, Clone)]
pub struct DetachedTransport {
    timeout: Duration,
}

impl DetachedTransport {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl BeaconTransport for DetachedTransport {
    fn name(&self) -> &'static str {
        "detached"
    }

    fn dispatch(&self, request: &BeaconRequest) -> Result<()> {
        let request = request.clone();
        let timeout = self.timeout;
        std::thread::Builder::new()
            .name("casekeep-beacon".to_string())
            .spawn(move || {
                let client = match reqwest::blocking::Client::builder().timeout(timeout).build() {
                    Ok(client) => client,
                    Err(e) => {
                        debug!("Logout beacon client unavailable: {}", e);
                        return;
                    }
                };
                let mut builder = client.post(&request.url);
                if let Some(token) = &request.bearer {
                    builder = builder.bearer_auth(token);
                }
                if let Err(e) = builder.send() {
                    debug!(url = %request.url, "Logout beacon failed: {}", e);
                }
            })
            .map(drop)
            .map_err(|e| SessionError::TransportUnavailable {
                transport: self.name(),
                reason: e.to_string(),
            })
    }
}

/// Tries each transport in order; returns the name of the one that took the request.
pub fn send_best_effort(transports: &[Arc<dyn BeaconTransport>], request: &BeaconRequest) -> Option<&'static str> {
    for transport in transports {
        match transport.dispatch(request) {
            Ok(()) => return Some(transport.name()),
            Err(e) => debug!("Beacon transport {} skipped: {}", transport.name(), e),
        }
    }
    warn!("No beacon transport accepted the logout request");
    None
}

/// Signs the user out when the host is torn down. Fires at most once.
pub struct LogoutBeacon {
    transports: Vec<Arc<dyn BeaconTransport>>,
    flags: SessionFlags,
    request: BeaconRequest,
    fired: AtomicBool,
}

impl fmt::Debug for LogoutBeacon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogoutBeacon")
            .field("transports", &self.transports.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("url", &self.request.url)
            .field("fired", &self.has_fired())
            .finish()
    }
}

impl LogoutBeacon {
    #[must_use]
    pub fn new(transports: Vec<Arc<dyn BeaconTransport>>, flags: SessionFlags, request: BeaconRequest) -> Self {
        Self {
            transports,
            flags,
            request,
            fired: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn on_page_hide(&self) -> bool {
        self.fire("page-hide")
    }

    pub fn on_before_unload(&self) -> bool {
        self.fire("before-unload")
    }

    /// Returns whether a logout request was handed to a transport.
    fn fire(&self, signal: &str) -> bool {
        if !self.flags.is_authenticated() {
            debug!(signal, "No authenticated session; beacon not sent");
            return false;
        }
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        let transport = send_best_effort(&self.transports, &self.request);
        self.flags.clear_authenticated();
        if let Some(name) = transport {
            info!(signal, transport = name, "Logout beacon sent");
        }
        transport.is_some()
    }
}
