//! Execution events recorded in a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::llm::Content;

/// Author name used for events carrying the user's message.
pub const USER_AUTHOR: &str = "user";

/// Side effects attached to an event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventActions {
    /// Keys to merge into the session state when the event is appended.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub state_delta: Map<String, Value>,

    /// Agent that takes over the invocation after this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_to_agent: Option<String>,
}

/// One step of an invocation: a user message, a model turn, or tool results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub invocation_id: String,
    /// `"user"` or the name of the agent that produced the event.
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default)]
    pub actions: EventActions,
    /// Set on incremental chunks of a streamed turn.
    #[serde(default)]
    pub partial: bool,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(invocation_id: &str, author: &str, content: Option<Content>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            invocation_id: invocation_id.to_string(),
            author: author.to_string(),
            content,
            actions: EventActions::default(),
            partial: false,
            timestamp: Utc::now(),
        }
    }

    pub fn with_actions(mut self, actions: EventActions) -> Self {
        self.actions = actions;
        self
    }

    pub fn is_from_user(&self) -> bool {
        self.author == USER_AUTHOR
    }

    /// Whether this event ends the agent's turn.
    ///
    /// A final response carries no function calls or function responses and
    /// is not a partial chunk.
    pub fn is_final_response(&self) -> bool {
        if self.partial {
            return false;
        }
        match &self.content {
            Some(content) => {
                content.function_calls().is_empty() && content.function_responses().is_empty()
            }
            None => true,
        }
    }

    /// The reply text of this event: its last non-thought text part, trimmed.
    ///
    /// Parts whose text is blank after trimming are skipped.
    pub fn final_text(&self) -> Option<String> {
        self.content.as_ref().and_then(|content| {
            content
                .parts
                .iter()
                .rev()
                .filter(|p| !p.is_thought())
                .filter_map(|p| p.text.as_deref())
                .map(str::trim)
                .find(|t| !t.is_empty())
                .map(str::to_string)
        })
    }
}

/// Create an id for one run of the agent tree.
pub fn new_invocation_id() -> String {
    format!("e-{}", Uuid::new_v4())
}
