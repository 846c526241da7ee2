//! Bridge error taxonomy.

use codebridge_client::ClientError;
use thiserror::Error;

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failures surfaced by the bridge core.
///
/// Reply timeouts are not errors; they are the `Reply::Timeout` sentinel on
/// the Ok path so callers can inform the user without failing the call.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The remote server no longer knows the session.
    ///
    /// The orchestrator drops the local mapping and the user is asked to
    /// retry; the failed send is not replayed automatically.
    #[error("session {0} expired or was not found")]
    SessionExpired(String),

    /// Any other RPC failure. The session mapping is kept: the fault is
    /// assumed transient.
    #[error("remote server error: {0}")]
    Transport(ClientError),

    /// The operation was cancelled before completing.
    #[error("operation cancelled")]
    Cancelled,
}

impl BridgeError {
    /// Map a client error from an operation on `session_id`: "not found"
    /// means the session is gone, everything else is a transport fault.
    pub(crate) fn from_client(session_id: &str, err: ClientError) -> Self {
        match err {
            ClientError::NotFound(_) => BridgeError::SessionExpired(session_id.to_string()),
            other => BridgeError::Transport(other),
        }
    }
}

/// Conversion for calls with no session in play (create, list): every client
/// failure, "not found" included, is a transport fault.
impl From<ClientError> for BridgeError {
    fn from(err: ClientError) -> Self {
        BridgeError::Transport(err)
    }
}
