use crate::config::ClientConfig;
use crate::error::{Result, SessionError};
use reqwest::{RequestBuilder, Response};
use tracing::debug;

/// HTTP access to the portal's session endpoints.
#[derive(Debug, Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    config: ClientConfig,
    bearer: Option<String>,
}

impl SessionClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be initialized.
    pub fn new(config: ClientConfig, bearer: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self { http, config, bearer })
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    #[must_use]
    pub fn who_am_i_url(&self) -> String {
        self.config.url_for(&self.config.who_am_i_path)
    }

    #[must_use]
    pub fn sign_out_url(&self) -> String {
        self.config.url_for(&self.config.sign_out_path)
    }

    #[must_use]
    pub fn sign_in_url(&self) -> String {
        self.config.url_for(&self.config.sign_in_path)
    }

    /// Asks the server who the current user is. Only the status matters.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Http` with the status for non-success answers and
    /// without one when the request could not be completed.
    pub async fn who_am_i(&self) -> Result<()> {
        let response = self.authorized(self.http.get(self.who_am_i_url())).send().await?;
        ensure_success(response)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Http` if the request fails or the server rejects it.
    pub async fn sign_out(&self) -> Result<()> {
        let response = self.authorized(self.http.post(self.sign_out_url())).send().await?;
        ensure_success(response)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn ensure_success(response: Response) -> Result<()> {
    let status = response.status();
    debug!(url = %response.url(), %status, "Session endpoint answered");
    if status.is_success() {
        Ok(())
    } else {
        Err(SessionError::Http {
            status: Some(status.as_u16()),
            message: status.canonical_reason().unwrap_or("unexpected status").to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client_for(base_url: String, bearer: Option<&str>) -> SessionClient {
        let config = ClientConfig {
            base_url,
            ..ClientConfig::default()
        };
        SessionClient::new(config, bearer.map(str::to_string)).unwrap()
    }

    #[test]
    fn test_urls_are_built_from_config() {
        let client = client_for("https://portal.example.com/".to_string(), None);
        assert_eq!(client.who_am_i_url(), "https://portal.example.com/api/auth/me");
        assert_eq!(client.sign_out_url(), "https://portal.example.com/api/auth/signout");
        assert_eq!(client.sign_in_url(), "https://portal.example.com/signin");
        assert!(client.bearer().is_none());
    }

    #[tokio::test]
    async fn test_who_am_i_sends_bearer_token() {
        let router = Router::new().route(
            "/api/auth/me",
            get(|headers: HeaderMap| async move {
                match headers.get("authorization").and_then(|h| h.to_str().ok()) {
                    Some("Bearer case-token") => StatusCode::OK,
                    _ => StatusCode::UNAUTHORIZED,
                }
            }),
        );
        let base = serve(router).await;

        assert!(client_for(base.clone(), Some("case-token")).who_am_i().await.is_ok());

        let err = client_for(base, None).who_am_i().await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn test_sign_out_posts_to_endpoint() {
        let router = Router::new().route("/api/auth/signout", post(|| async { StatusCode::NO_CONTENT }));
        let base = serve(router).await;

        assert!(client_for(base, Some("case-token")).sign_out().await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_server_has_no_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client_for(format!("http://{addr}"), None).who_am_i().await.unwrap_err();
        assert!(matches!(err, SessionError::Http { status: None, .. }));
    }
}
