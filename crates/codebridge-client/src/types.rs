//! Wire types for the OpenCode-style session API.
//!
//! These types define the contract with the remote server. The bridge only
//! interprets text parts; everything else deserializes into explicit
//! `Unknown` variants and is skipped.

use serde::{Deserialize, Serialize};

/// A session held by the remote server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
}

/// Role of a history entry, as assigned by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    User,
    Assistant,
    /// Any role this bridge does not interpret (system, tool, ...).
    Unknown,
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::Unknown,
        }
    }
}

/// A typed content fragment of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    /// Part types the bridge does not interpret (tool calls, step markers, ...).
    #[serde(other)]
    Unknown,
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// The text content if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::Unknown => None,
        }
    }
}

/// Server-assigned metadata for a history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: String,
    pub role: Role,
}

/// One entry in a session's message history.
///
/// The server returns history oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEntry {
    pub info: MessageInfo,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Request body for sending one chat turn into a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(rename = "providerID")]
    pub provider_id: String,
    #[serde(rename = "modelID")]
    pub model_id: String,
    pub parts: Vec<Part>,
}
