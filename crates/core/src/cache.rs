use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::identity::UserId;
use crate::domain::session::{SessionPatch, SessionRecord};

/// Process-local shadow of the backend's per-user session state.
///
/// Entries are created lazily by the first `set` for a user and live for the
/// rest of the process.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, user_id: UserId) -> Option<SessionRecord>;
    /// Merges `patch` into the user's record and returns the merged record.
    async fn set(&self, user_id: UserId, patch: SessionPatch) -> SessionRecord;
    async fn exists(&self, user_id: UserId) -> bool;
    async fn len(&self) -> usize;
}

#[derive(Default)]
pub struct InMemorySessionCache {
    records: RwLock<HashMap<UserId, SessionRecord>>,
}

impl InMemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn get(&self, user_id: UserId) -> Option<SessionRecord> {
        let records = self.records.read().await;
        records.get(&user_id).cloned()
    }

    async fn set(&self, user_id: UserId, patch: SessionPatch) -> SessionRecord {
        let mut records = self.records.write().await;
        let record = records.entry(user_id).or_default();
        record.apply(patch);
        record.clone()
    }

    async fn exists(&self, user_id: UserId) -> bool {
        let records = self.records.read().await;
        records.contains_key(&user_id)
    }

    async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}
