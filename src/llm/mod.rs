//! LLM client module for interacting with language models.
//!
//! This module provides a trait-based abstraction over LLM providers,
//! with the Gemini `generateContent` API as the primary implementation.
//!
//! The conversation types mirror Gemini's content model: a [`Content`] is a
//! role plus an ordered list of [`Part`]s, and a part carries text, a
//! function call, or a function response.

mod error;
mod gemini;
#[cfg(test)]
pub(crate) mod scripted;

pub use error::{classify_http_status, classify_status_name, LlmError, LlmErrorKind, RetryConfig};
pub use gemini::GeminiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role in a conversation.
///
/// Gemini only knows `user` and `model`; function responses travel as `user`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// Missing roles in responses are treated as model output
    #[default]
    Model,
}

/// A function call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Arguments object. Missing for no-argument functions.
    #[serde(default)]
    pub args: Value,
}

/// The result of a function call, sent back to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

/// One part of a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Set on text parts that carry planning or reasoning rather than an answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Create a text part flagged as a thought.
    pub fn thought(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            thought: Some(true),
            ..Default::default()
        }
    }

    /// Create a function call part.
    pub fn function_call(name: impl Into<String>, args: Value) -> Self {
        Self {
            function_call: Some(FunctionCall {
                id: None,
                name: name.into(),
                args,
            }),
            ..Default::default()
        }
    }

    /// Create a function response part.
    pub fn function_response(id: Option<String>, name: impl Into<String>, response: Value) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                id,
                name: name.into(),
                response,
            }),
            ..Default::default()
        }
    }

    pub fn is_thought(&self) -> bool {
        self.thought.unwrap_or(false)
    }
}

/// Message content: a role and its ordered parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    /// Create a user message with a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// Create a model message with a single text part.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::text(text)])
    }

    /// Function calls in this content, in order.
    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.parts
            .iter()
            .filter_map(|p| p.function_call.as_ref())
            .collect()
    }

    /// Function responses in this content, in order.
    pub fn function_responses(&self) -> Vec<&FunctionResponse> {
        self.parts
            .iter()
            .filter_map(|p| p.function_response.as_ref())
            .collect()
    }
}

/// A function the model may call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments; omitted for no-argument functions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Optional sampling parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    /// Sampling temperature (0 = deterministic).
    pub temperature: Option<f64>,
    /// Top-p nucleus sampling.
    pub top_p: Option<f64>,
    /// Maximum output tokens to generate.
    pub max_output_tokens: Option<u32>,
}

/// A single model call.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    pub tools: Vec<FunctionDeclaration>,
    pub options: GenerationOptions,
}

impl LlmRequest {
    /// Check whether a function with the given name is declared.
    pub fn declares(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }
}

/// Token usage information (if provided by the upstream provider).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a usage object ensuring `total_tokens` is consistent.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Response from a model call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
    pub model: Option<String>,
}

impl LlmResponse {
    /// Create a response carrying only model content.
    pub fn from_content(content: Content) -> Self {
        Self {
            content: Some(content),
            finish_reason: Some("STOP".to_string()),
            usage: None,
            model: None,
        }
    }
}

/// Trait for LLM clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one generation request.
    async fn generate(&self, request: &LlmRequest) -> anyhow::Result<LlmResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parts_serialize_in_gemini_shape() {
        let content = Content::new(
            Role::Model,
            vec![
                Part::thought("/*PLANNING*/ check the clock"),
                Part::function_call("get_current_time_tool", json!({})),
            ],
        );
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["role"], "model");
        assert_eq!(value["parts"][0]["thought"], true);
        assert_eq!(value["parts"][1]["functionCall"]["name"], "get_current_time_tool");
        assert!(value["parts"][1].get("text").is_none());
    }

    #[test]
    fn content_without_role_defaults_to_model() {
        let content: Content = serde_json::from_value(json!({
            "parts": [{"functionCall": {"name": "transfer_to_agent", "args": {"agent_name": "time_agent"}}}]
        }))
        .unwrap();
        assert_eq!(content.role, Role::Model);
        let calls = content.function_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args["agent_name"], "time_agent");
    }
}
