//! RecommendationSnapshotStore port - persisted last-known-good results.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::recommendation::CachedRecommendationRecord;

/// Keyed by `(user_id, context_hash)`.
#[async_trait]
pub trait RecommendationSnapshotStore: Send + Sync {
    async fn save(
        &self,
        user_id: &UserId,
        context_hash: &str,
        record: &CachedRecommendationRecord,
    ) -> Result<(), DomainError>;

    async fn load(
        &self,
        user_id: &UserId,
        context_hash: &str,
    ) -> Result<Option<CachedRecommendationRecord>, DomainError>;

    /// Removes every context stored for the user.
    async fn delete(&self, user_id: &UserId) -> Result<(), DomainError>;
}
