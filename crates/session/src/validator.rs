use crate::client::SessionClient;
use crate::error::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Valid,
    Invalid,
}

impl SessionStatus {
    /// Only an explicit authentication or authorization failure invalidates a session.
    #[must_use]
    pub const fn from_http_status(status: u16) -> Self {
        match status {
            401 | 403 => SessionStatus::Invalid,
            _ => SessionStatus::Valid,
        }
    }

    /// Transport failures carry no status and leave the session valid.
    #[must_use]
    pub fn from_result(result: &Result<()>) -> Self {
        match result {
            Ok(()) => SessionStatus::Valid,
            Err(e) => e.status().map_or(SessionStatus::Valid, Self::from_http_status),
        }
    }
}

#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn check(&self) -> SessionStatus;
}

/// Polls the portal's "who am I" endpoint.
#[derive(Debug, Clone)]
pub struct HttpSessionValidator {
    client: SessionClient,
}

impl HttpSessionValidator {
    #[must_use]
    pub const fn new(client: SessionClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionValidator for HttpSessionValidator {
    async fn check(&self) -> SessionStatus {
        let result = self.client.who_am_i().await;
        let status = SessionStatus::from_result(&result);
        match (&result, status) {
            (Ok(()), _) => debug!("Session check passed"),
            (Err(e), SessionStatus::Invalid) => warn!("Server rejected the session: {}", e),
            (Err(e), SessionStatus::Valid) => warn!("Session check failed, keeping session: {}", e),
        }
        status
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::SessionError;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tokio::net::TcpListener;

    async fn validator_answering(status: StatusCode) -> HttpSessionValidator {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route("/api/auth/me", get(move || async move { status }));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let config = ClientConfig {
            base_url: format!("http://{addr}"),
            ..ClientConfig::default()
        };
        HttpSessionValidator::new(SessionClient::new(config, Some("token".to_string())).unwrap())
    }

    #[test]
    fn test_only_auth_failures_invalidate() {
        assert_eq!(SessionStatus::from_http_status(401), SessionStatus::Invalid);
        assert_eq!(SessionStatus::from_http_status(403), SessionStatus::Invalid);
        for status in [200, 204, 404, 429, 500, 502, 503] {
            assert_eq!(SessionStatus::from_http_status(status), SessionStatus::Valid);
        }
    }

    #[test]
    fn test_transport_errors_fail_open() {
        let result: Result<()> = Err(SessionError::Http {
            status: None,
            message: "connection reset".to_string(),
        });
        assert_eq!(SessionStatus::from_result(&result), SessionStatus::Valid);
        assert_eq!(SessionStatus::from_result(&Ok(())), SessionStatus::Valid);
    }

    #[tokio::test]
    async fn test_http_validator_maps_statuses() {
        assert_eq!(validator_answering(StatusCode::OK).await.check().await, SessionStatus::Valid);
        assert_eq!(
            validator_answering(StatusCode::UNAUTHORIZED).await.check().await,
            SessionStatus::Invalid
        );
        assert_eq!(
            validator_answering(StatusCode::FORBIDDEN).await.check().await,
            SessionStatus::Invalid
        );
        assert_eq!(
            validator_answering(StatusCode::INTERNAL_SERVER_ERROR).await.check().await,
            SessionStatus::Valid
        );
    }

    #[tokio::test]
    async fn test_http_validator_unreachable_server_is_valid() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig {
            base_url: format!("http://{addr}"),
            ..ClientConfig::default()
        };
        let validator = HttpSessionValidator::new(SessionClient::new(config, None).unwrap());
        assert_eq!(validator.check().await, SessionStatus::Valid);
    }
}
