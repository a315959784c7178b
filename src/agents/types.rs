//! Core types for the agent system.

use crate::session::SessionError;

use super::tree::TreeError;

/// Errors that can occur in agent operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Invalid agent name '{0}': expected an identifier other than 'user'")]
    InvalidName(String),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Max iterations reached: {0}")]
    MaxIterations(usize),
}
