//! Send-then-poll reconciliation against the remote message history.
//!
//! The server has no synchronous "generate and return" call and no push
//! channel: a chat turn is accepted immediately and the reply materializes
//! in the session history some time later. The reconciler submits the turn,
//! then polls history on a bounded schedule until an assistant entry with
//! text appears. This trades latency (up to the full attempt budget) for
//! robustness against transient empty-history states.

use std::sync::Arc;
use std::time::Duration;

use codebridge_client::{ChatRequest, MessageEntry, Part, Role, SessionClient};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::model::ModelSelector;

/// Bounded retry schedule for history polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of history fetches per chat turn.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    /// 20 attempts at 500 ms: up to roughly 10 s before giving up.
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_millis(500),
        }
    }
}

/// Outcome of one reconciled chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The assistant's reply text.
    Text(String),
    /// No qualifying assistant message appeared within the polling budget.
    ///
    /// Deliberately a sentinel, not an error: the caller informs the user
    /// and the session stays usable.
    Timeout,
}

/// Drives the send-then-poll protocol for one chat turn at a time.
pub struct Reconciler {
    client: Arc<dyn SessionClient>,
    policy: RetryPolicy,
}

impl Reconciler {
    pub fn new(client: Arc<dyn SessionClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Submit `text` into the session, then poll history until the generated
    /// reply shows up or the attempt budget runs out.
    ///
    /// Each wait between attempts is interruptible through `cancel`. A "not
    /// found" from the server at any step maps to
    /// [`BridgeError::SessionExpired`]; the caller owns invalidating its
    /// mapping.
    pub async fn send_and_await_reply(
        &self,
        session_id: &str,
        text: &str,
        selector: &ModelSelector,
        cancel: &CancellationToken,
    ) -> Result<Reply> {
        let request = ChatRequest {
            provider_id: selector.provider.clone(),
            model_id: selector.model.clone(),
            parts: vec![Part::text(text)],
        };

        // The send response only acknowledges receipt; the reply is
        // reconciled from history below.
        self.client
            .send_chat(session_id, &request)
            .await
            .map_err(|e| BridgeError::from_client(session_id, e))?;

        for attempt in 1..=self.policy.max_attempts {
            let history = self
                .client
                .history(session_id)
                .await
                .map_err(|e| BridgeError::from_client(session_id, e))?;

            if let Some(reply) = latest_assistant_text(&history) {
                return Ok(Reply::Text(reply));
            }

            debug!(
                session_id = %session_id,
                attempt,
                entries = history.len(),
                "no assistant reply yet"
            );

            tokio::select! {
                () = cancel.cancelled() => return Err(BridgeError::Cancelled),
                () = tokio::time::sleep(self.policy.interval) => {}
            }
        }

        Ok(Reply::Timeout)
    }
}

/// Newest-first scan for the first assistant entry carrying non-empty text.
///
/// The server materializes an assistant entry before any text lands in it,
/// so entries whose text parts are all empty are skipped. The result
/// concatenates every text part of the matching entry in order.
fn latest_assistant_text(history: &[MessageEntry]) -> Option<String> {
    history
        .iter()
        .rev()
        .filter(|entry| entry.info.role == Role::Assistant)
        .find_map(|entry| {
            let has_text = entry
                .parts
                .iter()
                .any(|p| matches!(p, Part::Text { text } if !text.is_empty()));
            if !has_text {
                return None;
            }
            Some(entry.parts.iter().filter_map(Part::as_text).collect())
        })
}
