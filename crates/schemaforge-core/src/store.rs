//! Keyed cache of extraction results.
//!
//! The webhook populates it when the worker finishes a job and the poll
//! endpoint reads from it. Entries are never evicted. Callers hold an
//! `Arc<dyn ResultStore>` so a durable backend can replace the in-memory
//! one without touching them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Result store backend failed: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub result: Value,
    pub received_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait ResultStore: Send + Sync {
    /// Records the result for `request_id`, replacing any earlier one.
    async fn put(&self, request_id: &str, result: Value) -> StoreResult<()>;

    async fn get(&self, request_id: &str) -> StoreResult<Option<StoredResult>>;
}

#[derive(Debug, Default)]
pub struct MemoryResultStore {
    entries: RwLock<HashMap<String, StoredResult>>,
}

impl MemoryResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl ResultStore for MemoryResultStore {
    async fn put(&self, request_id: &str, result: Value) -> StoreResult<()> {
        let entry = StoredResult {
            result,
            received_at: Utc::now(),
        };
        self.entries
            .write()
            .await
            .insert(request_id.to_string(), entry);
        Ok(())
    }

    async fn get(&self, request_id: &str) -> StoreResult<Option<StoredResult>> {
        Ok(self.entries.read().await.get(request_id).cloned())
    }
}
