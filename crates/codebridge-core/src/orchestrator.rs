//! Composition root of the bridge core.

use std::sync::Arc;

use codebridge_client::SessionClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{BridgeError, Result};
use crate::model::ModelSelector;
use crate::reconciler::{Reconciler, Reply, RetryPolicy};
use crate::registry::SessionRegistry;

/// A remote session paired with whether it is the caller's active one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionListing {
    pub id: String,
    pub active: bool,
}

/// Combines the registry and the reconciler behind the gateway-facing
/// surface: relay a chat turn, manage sessions, list them.
pub struct Orchestrator {
    client: Arc<dyn SessionClient>,
    registry: SessionRegistry,
    reconciler: Reconciler,
    default_model: String,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn SessionClient>,
        policy: RetryPolicy,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(client.clone()),
            reconciler: Reconciler::new(client.clone(), policy),
            client,
            default_model: default_model.into(),
        }
    }

    /// Relay one chat turn for `user_id` and return the reconciled reply.
    ///
    /// The user's session is created on first use. When the server reports
    /// the session gone, the mapping is dropped and [`BridgeError::SessionExpired`]
    /// surfaces to the caller; the turn is not retried automatically. Any
    /// other failure propagates unchanged and keeps the mapping.
    pub async fn send_message(
        &self,
        user_id: &str,
        text: &str,
        selector: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Reply> {
        let selector = ModelSelector::parse(selector.unwrap_or(&self.default_model));
        let session_id = self.registry.resolve(user_id).await?;

        match self
            .reconciler
            .send_and_await_reply(&session_id, text, &selector, cancel)
            .await
        {
            Err(BridgeError::SessionExpired(id)) => {
                warn!(user_id = %user_id, session_id = %id, "remote session gone, dropping mapping");
                self.registry.invalidate(user_id).await;
                Err(BridgeError::SessionExpired(id))
            }
            other => other,
        }
    }

    /// Start a fresh session for the user, abandoning any previous mapping.
    pub async fn create_session(&self, user_id: &str) -> Result<String> {
        let session_id = self.registry.force_create(user_id).await?;
        info!(user_id = %user_id, session_id = %session_id, "session created");
        Ok(session_id)
    }

    /// Point the user at an existing session without checking it remotely.
    pub async fn switch_session(&self, user_id: &str, session_id: &str) {
        self.registry.set_active(user_id, session_id).await;
        info!(user_id = %user_id, session_id = %session_id, "session switched");
    }

    /// Remote session listing with the caller's active session marked.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionListing>> {
        let active = self.registry.active_for(user_id).await;
        let sessions = self.client.list_sessions().await?;

        Ok(sessions
            .into_iter()
            .map(|s| SessionListing {
                active: active.as_deref() == Some(s.id.as_str()),
                id: s.id,
            })
            .collect())
    }

    /// The canonical default model selector.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_MODEL;
    use crate::testutil::{ScriptedClient, entry, not_found};
    use codebridge_client::{Part, Role};
    use std::time::Duration;

    fn orchestrator(client: Arc<ScriptedClient>) -> Orchestrator {
        let policy = RetryPolicy {
            max_attempts: 3,
            interval: Duration::ZERO,
        };
        Orchestrator::new(client, policy, DEFAULT_MODEL)
    }

    #[tokio::test]
    async fn send_message_creates_session_and_returns_reply() {
        let client = Arc::new(ScriptedClient::new());
        client.push_history(vec![
            entry("m1", Role::User, vec![Part::text("hi")]),
            entry("m2", Role::Assistant, vec![Part::text("Hello!")]),
        ]);
        let orchestrator = orchestrator(client.clone());

        let reply = orchestrator
            .send_message("user_1", "hi", None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply, Reply::Text("Hello!".to_string()));
        assert_eq!(client.sessions_created(), 1);
    }

    #[tokio::test]
    async fn send_message_defaults_the_model_selector() {
        let client = Arc::new(ScriptedClient::new());
        client.push_history(vec![entry("m1", Role::Assistant, vec![Part::text("ok")])]);
        let orchestrator = orchestrator(client.clone());

        orchestrator
            .send_message("user_1", "hi", None, &CancellationToken::new())
            .await
            .unwrap();

        let sent = client.sent();
        assert_eq!(sent[0].1.model_id, DEFAULT_MODEL);
        assert_eq!(sent[0].1.provider_id, "google");
    }

    #[tokio::test]
    async fn send_message_honors_explicit_selector() {
        let client = Arc::new(ScriptedClient::new());
        client.push_history(vec![entry("m1", Role::Assistant, vec![Part::text("ok")])]);
        let orchestrator = orchestrator(client.clone());

        orchestrator
            .send_message("user_1", "hi", Some("openai/gpt-4o"), &CancellationToken::new())
            .await
            .unwrap();

        let sent = client.sent();
        assert_eq!(sent[0].1.provider_id, "openai");
        assert_eq!(sent[0].1.model_id, "gpt-4o");
    }

    #[tokio::test]
    async fn expired_session_invalidates_mapping_without_retry() {
        let client = Arc::new(ScriptedClient::new());
        let orchestrator = orchestrator(client.clone());

        let session_id = orchestrator.create_session("user_1").await.unwrap();
        client.fail_next_send(not_found(&session_id));

        let err = orchestrator
            .send_message("user_1", "hi", None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::SessionExpired(_)));
        assert_eq!(orchestrator.registry.active_for("user_1").await, None);
        // Only the explicit create; the failed send was not retried.
        assert_eq!(client.sessions_created(), 1);
    }

    #[tokio::test]
    async fn transport_failure_keeps_mapping() {
        let client = Arc::new(ScriptedClient::new());
        let orchestrator = orchestrator(client.clone());

        let session_id = orchestrator.create_session("user_1").await.unwrap();
        client.fail_next_send(codebridge_client::ClientError::Api {
            status: 500,
            message: "boom".to_string(),
        });

        let err = orchestrator
            .send_message("user_1", "hi", None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::Transport(_)));
        assert_eq!(
            orchestrator.registry.active_for("user_1").await,
            Some(session_id)
        );
    }

    #[tokio::test]
    async fn timeout_surfaces_as_sentinel() {
        let client = Arc::new(ScriptedClient::new());
        let orchestrator = orchestrator(client);

        let reply = orchestrator
            .send_message("user_1", "hi", None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply, Reply::Timeout);
    }

    #[tokio::test]
    async fn switch_session_takes_effect_on_next_send() {
        let client = Arc::new(ScriptedClient::new());
        client.push_history(vec![entry("m1", Role::Assistant, vec![Part::text("ok")])]);
        let orchestrator = orchestrator(client.clone());

        orchestrator.switch_session("user_1", "session_manual").await;
        orchestrator
            .send_message("user_1", "hi", None, &CancellationToken::new())
            .await
            .unwrap();

        let sent = client.sent();
        assert_eq!(sent[0].0, "session_manual");
        assert_eq!(client.sessions_created(), 0);
    }

    #[tokio::test]
    async fn list_sessions_marks_only_the_callers_active_session() {
        let client = Arc::new(ScriptedClient::new());
        client.set_listed(&["s1", "s2", "s3"]);
        let orchestrator = orchestrator(client);

        orchestrator.switch_session("user_1", "s2").await;
        let listings = orchestrator.list_sessions("user_1").await.unwrap();

        assert_eq!(
            listings,
            vec![
                SessionListing {
                    id: "s1".to_string(),
                    active: false
                },
                SessionListing {
                    id: "s2".to_string(),
                    active: true
                },
                SessionListing {
                    id: "s3".to_string(),
                    active: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn list_sessions_with_no_mapping_marks_nothing() {
        let client = Arc::new(ScriptedClient::new());
        client.set_listed(&["s1", "s2"]);
        let orchestrator = orchestrator(client);

        let listings = orchestrator.list_sessions("user_1").await.unwrap();
        assert!(listings.iter().all(|l| !l.active));
    }
}
