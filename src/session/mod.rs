//! Sessions: per-conversation state and event history.
//!
//! A session is addressed by `(app_name, user_id, session_id)`. The gateway
//! creates a fresh in-memory session for every request, so nothing outlives
//! the call that created it.

mod event;
mod memory;

pub use event::{new_invocation_id, Event, EventActions, USER_AUTHOR};
pub use memory::InMemorySessionService;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// State keys with this prefix live only for the current invocation.
pub const TEMP_PREFIX: &str = "temp:";

/// Address of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(app_name: &str, user_id: &str, session_id: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

/// A conversation: key/value state plus the ordered event log.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub key: SessionKey,
    pub state: Map<String, Value>,
    pub events: Vec<Event>,
    pub last_update_time: DateTime<Utc>,
}

impl Session {
    pub fn new(key: SessionKey, state: Map<String, Value>) -> Self {
        Self {
            key,
            state,
            events: Vec::new(),
            last_update_time: Utc::now(),
        }
    }

    /// Record an event and merge its state delta.
    ///
    /// Keys under [`TEMP_PREFIX`] are not persisted into the state.
    pub fn apply(&mut self, event: &Event) {
        for (key, value) in &event.actions.state_delta {
            if key.starts_with(TEMP_PREFIX) {
                continue;
            }
            self.state.insert(key.clone(), value.clone());
        }
        self.events.push(event.clone());
        self.last_update_time = event.timestamp;
    }
}

/// Errors in session operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Session already exists: {0}")]
    AlreadyExists(SessionKey),

    #[error("Session not found: {0}")]
    NotFound(SessionKey),
}

/// Storage for sessions.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Create a new session with an optional initial state.
    ///
    /// # Errors
    /// Returns `SessionError::AlreadyExists` if the key is taken.
    async fn create_session(
        &self,
        key: &SessionKey,
        state: Option<Map<String, Value>>,
    ) -> Result<Session, SessionError>;

    /// Fetch a snapshot of a session.
    async fn get_session(&self, key: &SessionKey) -> Result<Option<Session>, SessionError>;

    /// Append an event to a session, applying its state delta.
    ///
    /// # Errors
    /// Returns `SessionError::NotFound` if the session does not exist.
    async fn append_event(&self, key: &SessionKey, event: Event) -> Result<Event, SessionError>;

    /// Remove a session. Removing a missing session is not an error.
    async fn delete_session(&self, key: &SessionKey) -> Result<(), SessionError>;
}
