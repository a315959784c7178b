//! API request and response types.

use serde::{Deserialize, Serialize};

/// Request to run the agents on a prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptRequest {
    /// The user prompt
    pub text: String,
}

/// Reply of the root agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptResponse {
    pub text: String,
}

/// Fixed greeting returned by `GET /prompt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreetingResponse {
    pub prompt: String,
}

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A previous turn of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Chat request as sent by the web UI.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The new user message
    pub message: String,

    /// Earlier turns, oldest first
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,

    /// Model shared by all agents
    pub model: String,

    /// Agent profile being served
    pub agent: String,
}
