//! Scripted in-memory `SessionClient` for core tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use codebridge_client::{
    ChatRequest, ClientError, MessageEntry, MessageInfo, Part, Role, Result, SessionClient,
    SessionInfo,
};

/// Build a history entry for tests.
pub(crate) fn entry(id: &str, role: Role, parts: Vec<Part>) -> MessageEntry {
    MessageEntry {
        info: MessageInfo {
            id: id.to_string(),
            role,
        },
        parts,
    }
}

/// A "not found" error as the HTTP client would produce for a stale session.
pub(crate) fn not_found(session_id: &str) -> ClientError {
    ClientError::NotFound(format!("/session/{session_id}/message"))
}

/// Fake remote server scripted per call.
///
/// Sessions get sequential ids (`session_1`, `session_2`, ...). History
/// responses are consumed from a queue, one per poll; once the queue is
/// empty every further poll sees an empty history.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    created: AtomicUsize,
    history_calls: AtomicUsize,
    listed: Mutex<Vec<SessionInfo>>,
    sent: Mutex<Vec<(String, ChatRequest)>>,
    send_failure: Mutex<Option<ClientError>>,
    histories: Mutex<VecDeque<Result<Vec<MessageEntry>>>>,
}

impl ScriptedClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue one history response for the next poll.
    pub(crate) fn push_history(&self, history: Vec<MessageEntry>) {
        self.histories.lock().unwrap().push_back(Ok(history));
    }

    /// Queue a failure for the next poll.
    pub(crate) fn push_history_error(&self, err: ClientError) {
        self.histories.lock().unwrap().push_back(Err(err));
    }

    /// Make the next `send_chat` fail with `err`.
    pub(crate) fn fail_next_send(&self, err: ClientError) {
        *self.send_failure.lock().unwrap() = Some(err);
    }

    /// Fix the response of `list_sessions`.
    pub(crate) fn set_listed(&self, ids: &[&str]) {
        *self.listed.lock().unwrap() = ids
            .iter()
            .map(|id| SessionInfo { id: id.to_string() })
            .collect();
    }

    pub(crate) fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sent(&self) -> Vec<(String, ChatRequest)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionClient for ScriptedClient {
    async fn create_session(&self) -> Result<SessionInfo> {
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionInfo {
            id: format!("session_{n}"),
        })
    }

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        Ok(self.listed.lock().unwrap().clone())
    }

    async fn send_chat(&self, session_id: &str, request: &ChatRequest) -> Result<()> {
        if let Some(err) = self.send_failure.lock().unwrap().take() {
            return Err(err);
        }
        self.sent
            .lock()
            .unwrap()
            .push((session_id.to_string(), request.clone()));
        Ok(())
    }

    async fn history(&self, _session_id: &str) -> Result<Vec<MessageEntry>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        match self.histories.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(Vec::new()),
        }
    }
}
