//! In-memory session service (non-persistent).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{Event, Session, SessionError, SessionKey, SessionService};

#[derive(Clone, Default)]
pub struct InMemorySessionService {
    sessions: Arc<RwLock<HashMap<SessionKey, Session>>>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn create_session(
        &self,
        key: &SessionKey,
        state: Option<Map<String, Value>>,
    ) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(key) {
            return Err(SessionError::AlreadyExists(key.clone()));
        }
        let session = Session::new(key.clone(), state.unwrap_or_default());
        sessions.insert(key.clone(), session.clone());
        tracing::debug!("Created session {}", key);
        Ok(session)
    }

    async fn get_session(&self, key: &SessionKey) -> Result<Option<Session>, SessionError> {
        Ok(self.sessions.read().await.get(key).cloned())
    }

    async fn append_event(&self, key: &SessionKey, event: Event) -> Result<Event, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(key)
            .ok_or_else(|| SessionError::NotFound(key.clone()))?;
        session.apply(&event);
        Ok(event)
    }

    async fn delete_session(&self, key: &SessionKey) -> Result<(), SessionError> {
        self.sessions.write().await.remove(key);
        Ok(())
    }
}
