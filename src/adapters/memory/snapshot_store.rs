//! In-memory RecommendationSnapshotStore.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::recommendation::CachedRecommendationRecord;
use crate::ports::RecommendationSnapshotStore;

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    records: RwLock<HashMap<(UserId, String), CachedRecommendationRecord>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecommendationSnapshotStore for InMemorySnapshotStore {
    async fn save(
        &self,
        user_id: &UserId,
        context_hash: &str,
        record: &CachedRecommendationRecord,
    ) -> Result<(), DomainError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((user_id.clone(), context_hash.to_string()), record.clone());
        Ok(())
    }

    async fn load(
        &self,
        user_id: &UserId,
        context_hash: &str,
    ) -> Result<Option<CachedRecommendationRecord>, DomainError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(user_id.clone(), context_hash.to_string()))
            .cloned())
    }

    async fn delete(&self, user_id: &UserId) -> Result<(), DomainError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(owner, _), _| owner != user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;

    fn record() -> CachedRecommendationRecord {
        CachedRecommendationRecord {
            ranked_ids: vec![],
            scores: vec![],
            generated_at: Timestamp::now(),
            ttl_seconds: 60,
            stale: false,
        }
    }

    #[tokio::test]
    async fn delete_removes_all_contexts_of_user() {
        let store = InMemorySnapshotStore::new();
        let a = UserId::new("a").unwrap();
        let b = UserId::new("b").unwrap();
        store.save(&a, "h1", &record()).await.unwrap();
        store.save(&a, "h2", &record()).await.unwrap();
        store.save(&b, "h1", &record()).await.unwrap();

        store.delete(&a).await.unwrap();

        assert!(store.load(&a, "h1").await.unwrap().is_none());
        assert!(store.load(&b, "h1").await.unwrap().is_some());
        assert_eq!(store.len(), 1);
    }
}
