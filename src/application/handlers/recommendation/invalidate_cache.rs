//! InvalidateCacheHandler - Command handler for explicit cache invalidation.

use std::sync::Arc;

use crate::application::recommendation::RecommendationCache;
use crate::domain::foundation::UserId;

/// Command to mark a user's recommendations stale.
#[derive(Debug, Clone)]
pub struct InvalidateCacheCommand {
    pub user_id: UserId,
    /// Also forget in-memory entries and persisted snapshots.
    pub purge: bool,
}

impl InvalidateCacheCommand {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            purge: false,
        }
    }

    pub fn purging(mut self) -> Self {
        self.purge = true;
        self
    }
}

/// Result of an invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidateCacheResult {
    /// Cached contexts that were marked stale; zero after a purge.
    pub contexts_invalidated: usize,
}

pub struct InvalidateCacheHandler {
    cache: Arc<RecommendationCache>,
}

impl InvalidateCacheHandler {
    pub fn new(cache: Arc<RecommendationCache>) -> Self {
        Self { cache }
    }

    pub async fn handle(&self, cmd: InvalidateCacheCommand) -> InvalidateCacheResult {
        if cmd.purge {
            self.cache.purge_user(&cmd.user_id).await;
            tracing::info!(user_id = %cmd.user_id, "Purged cached recommendations");
            return InvalidateCacheResult {
                contexts_invalidated: 0,
            };
        }
        InvalidateCacheResult {
            contexts_invalidated: self.cache.invalidate_user(&cmd.user_id),
        }
    }
}
