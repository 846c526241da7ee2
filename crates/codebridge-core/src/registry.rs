//! In-memory mapping from chat users to remote session ids.

use std::collections::HashMap;
use std::sync::Arc;

use codebridge_client::SessionClient;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::sync::KeyedLocks;

/// Mapping from external user id to the id of that user's active remote
/// session.
///
/// At most one active session per user; overwriting abandons the previous
/// remote session without deleting it. Different users never contend with
/// each other, and session creation for a single user is serialized so
/// concurrent first messages produce exactly one remote session.
#[derive(Clone)]
pub struct SessionRegistry {
    client: Arc<dyn SessionClient>,
    active: Arc<RwLock<HashMap<String, String>>>,
    inflight: KeyedLocks,
}

impl SessionRegistry {
    /// Create an empty registry backed by the given remote client.
    pub fn new(client: Arc<dyn SessionClient>) -> Self {
        Self {
            client,
            active: Arc::new(RwLock::new(HashMap::new())),
            inflight: KeyedLocks::new(),
        }
    }

    /// Return the user's active session id, creating a remote session first
    /// if the user has none.
    pub async fn resolve(&self, user_id: &str) -> Result<String> {
        let lock = self.inflight.get(user_id);
        let _guard = lock.lock().await;

        if let Some(id) = self.active.read().await.get(user_id) {
            return Ok(id.clone());
        }

        let session = self.client.create_session().await?;
        self.active
            .write()
            .await
            .insert(user_id.to_string(), session.id.clone());
        debug!(user_id = %user_id, session_id = %session.id, "created session on first use");
        Ok(session.id)
    }

    /// Always create a fresh remote session and make it the user's active
    /// one, discarding any previous mapping.
    ///
    /// The creation call carries no model parameter: the model is bound per
    /// chat turn, not per session.
    pub async fn force_create(&self, user_id: &str) -> Result<String> {
        let lock = self.inflight.get(user_id);
        let _guard = lock.lock().await;

        let session = self.client.create_session().await?;
        self.active
            .write()
            .await
            .insert(user_id.to_string(), session.id.clone());
        debug!(user_id = %user_id, session_id = %session.id, "created session on request");
        Ok(session.id)
    }

    /// Unconditionally point the user at `session_id`.
    ///
    /// No remote existence check is made; switching to a nonexistent session
    /// only surfaces on the next send.
    pub async fn set_active(&self, user_id: &str, session_id: &str) {
        self.active
            .write()
            .await
            .insert(user_id.to_string(), session_id.to_string());
    }

    /// Drop the user's mapping, if any.
    ///
    /// Called after the server reports the session no longer exists.
    pub async fn invalidate(&self, user_id: &str) {
        self.active.write().await.remove(user_id);
    }

    /// The session id currently mapped to `user_id`, if any.
    pub async fn active_for(&self, user_id: &str) -> Option<String> {
        self.active.read().await.get(user_id).cloned()
    }

    /// Snapshot of all known user -> session mappings.
    pub async fn known_active(&self) -> HashMap<String, String> {
        self.active.read().await.clone()
    }
}
