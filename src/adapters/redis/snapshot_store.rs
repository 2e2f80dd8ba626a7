//! Redis-backed recommendation snapshots.
//!
//! Each `(user_id, context_hash)` record is stored as JSON under its own
//! key with a retention expiry. A per-user set tracks the context hashes
//! so that `delete` can drop every context of a user at once.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::recommendation::CachedRecommendationRecord;
use crate::ports::RecommendationSnapshotStore;

const DEFAULT_PREFIX: &str = "opportunity-matcher:recs";

#[derive(Clone)]
pub struct RedisSnapshotStore {
    conn: MultiplexedConnection,
    prefix: String,
    retention_secs: u64,
}

impl RedisSnapshotStore {
    pub fn new(conn: MultiplexedConnection, retention_secs: u64) -> Self {
        Self {
            conn,
            prefix: DEFAULT_PREFIX.to_string(),
            retention_secs,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn record_key(&self, user_id: &UserId, context_hash: &str) -> String {
        format!("{}:{}:{}", self.prefix, user_id, context_hash)
    }

    fn index_key(&self, user_id: &UserId) -> String {
        format!("{}:{}:contexts", self.prefix, user_id)
    }
}

#[async_trait]
impl RecommendationSnapshotStore for RedisSnapshotStore {
    async fn save(
        &self,
        user_id: &UserId,
        context_hash: &str,
        record: &CachedRecommendationRecord,
    ) -> Result<(), DomainError> {
        let payload = serde_json::to_string(record).map_err(DomainError::cache)?;
        let index_key = self.index_key(user_id);
        let mut conn = self.conn.clone();

        redis::pipe()
            .atomic()
            .set_ex(self.record_key(user_id, context_hash), payload, self.retention_secs)
            .ignore()
            .sadd(&index_key, context_hash)
            .ignore()
            .expire(&index_key, self.retention_secs as i64)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e: redis::RedisError| DomainError::cache(e))?;

        Ok(())
    }

    async fn load(
        &self,
        user_id: &UserId,
        context_hash: &str,
    ) -> Result<Option<CachedRecommendationRecord>, DomainError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(self.record_key(user_id, context_hash))
            .await
            .map_err(|e: redis::RedisError| DomainError::cache(e))?;

        payload
            .map(|p| serde_json::from_str(&p).map_err(DomainError::cache))
            .transpose()
    }

    async fn delete(&self, user_id: &UserId) -> Result<(), DomainError> {
        let index_key = self.index_key(user_id);
        let mut conn = self.conn.clone();

        let hashes: Vec<String> = conn
            .smembers(&index_key)
            .await
            .map_err(|e: redis::RedisError| DomainError::cache(e))?;

        let mut keys: Vec<String> = hashes
            .iter()
            .map(|h| self.record_key(user_id, h))
            .collect();
        keys.push(index_key);

        conn.del::<_, ()>(keys)
            .await
            .map_err(|e: redis::RedisError| DomainError::cache(e))?;

        Ok(())
    }
}
