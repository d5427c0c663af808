use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use schemaforge_core::{MemoryResultStore, ResultStore, SchemaSlot};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::ServerConfig;

/// Unique identifier for a session
pub type SessionId = Uuid;

/// Session tracks a user's connection and the schema they are editing
pub struct Session {
    pub id: SessionId,
    pub slot: SchemaSlot,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            slot: SchemaSlot::new(),
            created_at: now,
            last_seen: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
    }
}

/// Owns every session. Sessions never share a slot, and any session idle
/// for longer than `ttl` is dropped along with its schema.
pub struct SessionManager {
    sessions: HashMap<SessionId, Session>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    /// Get or create a session by ID
    pub fn get_or_create_session(&mut self, session_id: SessionId) -> &mut Session {
        self.evict_idle(Utc::now());
        let session = self
            .sessions
            .entry(session_id)
            .or_insert_with(|| Session::new(session_id));
        session.touch();
        session
    }

    pub fn get_session(&self, session_id: SessionId) -> Option<&Session> {
        self.sessions.get(&session_id)
    }

    /// Drops sessions last seen before `now - ttl`. Returns how many went.
    pub fn evict_idle(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.ttl;
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.last_seen >= cutoff);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} idle session(s)", evicted);
        }
        evicted
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<RwLock<SessionManager>>,
    /// Extraction results, written by the webhook and read by pollers
    pub results: Arc<dyn ResultStore>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            manager: Arc::new(RwLock::new(SessionManager::new(config.session_ttl()))),
            results: Arc::new(MemoryResultStore::new()),
            config,
        }
    }

    #[cfg(test)]
    pub fn with_store(mut self, results: Arc<dyn ResultStore>) -> Self {
        self.results = results;
        self
    }
}
