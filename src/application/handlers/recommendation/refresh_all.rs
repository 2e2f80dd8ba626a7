//! RefreshAllHandler - Command handler for an on-demand batch refresh.

use std::sync::Arc;

use tokio::sync::watch;

use crate::application::recommendation::{BatchRefresher, RefreshReport};
use crate::domain::foundation::DomainError;

/// Command to refresh every active user's recommendations now.
#[derive(Debug, Clone, Default)]
pub struct RefreshAllCommand;

pub struct RefreshAllHandler {
    refresher: Arc<BatchRefresher>,
    cancel: watch::Receiver<bool>,
}

impl RefreshAllHandler {
    /// `cancel` stops the run between users, typically the engine's
    /// shutdown signal.
    pub fn new(refresher: Arc<BatchRefresher>, cancel: watch::Receiver<bool>) -> Self {
        Self { refresher, cancel }
    }

    pub async fn handle(&self, _cmd: RefreshAllCommand) -> Result<RefreshReport, DomainError> {
        self.refresher.run(self.cancel.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryProfileRepository, InMemorySnapshotStore};
    use crate::application::recommendation::{RecommendationCache, RecommendationSource};
    use crate::domain::foundation::{Timestamp, UserId};
    use crate::domain::matching::UserProfile;
    use crate::domain::ranking::RankedOpportunity;
    use crate::domain::recommendation::RecommendationContext;
    use async_trait::async_trait;

    struct NoSource;

    #[async_trait]
    impl RecommendationSource for NoSource {
        async fn compute(
            &self,
            _user_id: &UserId,
            _context: &RecommendationContext,
            _as_of: Timestamp,
        ) -> Result<Vec<RankedOpportunity>, DomainError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn refreshes_all_active_users() {
        let repo = Arc::new(InMemoryProfileRepository::new());
        for id in ["a", "b", "c"] {
            repo.insert_profile(UserProfile::new(UserId::new(id).unwrap()));
        }
        let cache = Arc::new(RecommendationCache::new(
            Arc::new(NoSource),
            Arc::new(InMemorySnapshotStore::new()),
            3600,
        ));
        let (_tx, rx) = watch::channel(false);
        let handler = RefreshAllHandler::new(Arc::new(BatchRefresher::new(repo, cache, 2)), rx);

        let report = handler.handle(RefreshAllCommand).await.unwrap();

        assert_eq!(report.refreshed, 3);
    }
}
