//! HTTP client for an OpenCode-style session server.
//!
//! Provides the `SessionClient` trait the bridge core is written against,
//! plus `HttpSessionClient`, its reqwest-backed implementation. Tests and
//! alternative transports implement the trait directly.

mod error;
mod types;

pub use error::{ClientError, Result};
pub use types::{ChatRequest, MessageEntry, MessageInfo, Part, Role, SessionInfo};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

/// RPC surface the bridge core needs from the remote server.
///
/// All calls are request/response; "not found" surfaces as
/// `ClientError::NotFound` and is distinguishable from other failures.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Create a new session.
    async fn create_session(&self) -> Result<SessionInfo>;

    /// List all sessions known to the server.
    async fn list_sessions(&self) -> Result<Vec<SessionInfo>>;

    /// Send one chat turn into a session.
    ///
    /// The response only acknowledges receipt and triggers generation; the
    /// generated reply is read back via `history`.
    async fn send_chat(&self, session_id: &str, request: &ChatRequest) -> Result<()>;

    /// Fetch the full message history for a session, oldest first.
    async fn history(&self, session_id: &str) -> Result<Vec<MessageEntry>>;
}

/// HTTP implementation of `SessionClient`.
#[derive(Debug, Clone)]
pub struct HttpSessionClient {
    base_url: String,
    http: Client,
}

impl HttpSessionClient {
    /// Create a new client pointing at the given base URL.
    ///
    /// Example: `HttpSessionClient::new("http://localhost:54321")`
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Parse an error response into a ClientError.
    async fn parse_error(&self, response: reqwest::Response) -> ClientError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return ClientError::NotFound(response.url().path().to_string());
        }

        let message = response.text().await.unwrap_or_default();
        ClientError::Api {
            status: status.as_u16(),
            message,
        }
    }

    /// Parse a successful JSON response or convert the error response.
    async fn json_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(self.parse_error(response).await)
        }
    }
}

#[async_trait]
impl SessionClient for HttpSessionClient {
    async fn create_session(&self) -> Result<SessionInfo> {
        let url = format!("{}/session", self.base_url);
        // The server rejects bodyless POSTs, so send an empty JSON object.
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        self.json_response(response).await
    }

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        let url = format!("{}/session", self.base_url);
        let response = self.http.get(&url).send().await?;
        self.json_response(response).await
    }

    async fn send_chat(&self, session_id: &str, request: &ChatRequest) -> Result<()> {
        let url = format!("{}/session/{}/message", self.base_url, session_id);
        let response = self.http.post(&url).json(request).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.parse_error(response).await)
        }
    }

    async fn history(&self, session_id: &str) -> Result<Vec<MessageEntry>> {
        let url = format!("{}/session/{}/message", self.base_url, session_id);
        let response = self.http.get(&url).send().await?;
        self.json_response(response).await
    }
}
