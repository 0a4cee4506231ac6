use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::{error::Result, session::ConversationState};

/// Trait for storing and retrieving conversation state by session id
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Stores `state` under `state.id`, refreshing its last-touched time.
    async fn save(&self, state: ConversationState) -> Result<()>;
    /// Returns the state for `id` unless it is absent or expired.
    async fn get(&self, id: &str) -> Result<Option<ConversationState>>;
    async fn delete(&self, id: &str) -> Result<()>;
    /// Drops every expired state, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
}

/// In-memory implementation of SessionStorage with idle expiry.
///
/// Overlapping writes for the same session are last-write-wins.
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, ConversationState>>,
    ttl: Duration,
}

impl InMemorySessionStorage {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    fn is_expired(&self, state: &ConversationState) -> bool {
        Utc::now() - state.updated_at > self.ttl
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, mut state: ConversationState) -> Result<()> {
        state.touch();
        self.sessions.insert(state.id.clone(), state);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ConversationState>> {
        let state = self.sessions.get(id).map(|entry| entry.clone());
        match state {
            Some(state) if self.is_expired(&state) => {
                debug!(session_id = %id, "Session expired");
                self.sessions.remove(id);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let before = self.sessions.len();
        let now = Utc::now();
        self.sessions
            .retain(|_, state| now - state.updated_at <= self.ttl);
        Ok(before.saturating_sub(self.sessions.len()))
    }
}
