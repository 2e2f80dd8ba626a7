//! GetRecommendationsHandler - Query handler for ranked recommendations.

use std::sync::Arc;

use crate::application::recommendation::RecommendationCache;
use crate::domain::foundation::UserId;
use crate::domain::ranking::RankingPolicy;
use crate::domain::recommendation::{RecommendationContext, RecommendationResult};

/// Query for a user's recommendations in a context.
#[derive(Debug, Clone)]
pub struct GetRecommendationsQuery {
    pub user_id: UserId,
    pub context: RecommendationContext,
    /// Requested list length; capped at the configured `top_n`.
    pub limit: Option<usize>,
}

/// Serves recommendations through the coalescing cache.
///
/// Never fails: a failed recompute yields the last known-good result, or an
/// empty one, flagged `stale`.
pub struct GetRecommendationsHandler {
    cache: Arc<RecommendationCache>,
    policy: RankingPolicy,
}

impl GetRecommendationsHandler {
    pub fn new(cache: Arc<RecommendationCache>, policy: RankingPolicy) -> Self {
        Self { cache, policy }
    }

    pub async fn handle(&self, query: GetRecommendationsQuery) -> RecommendationResult {
        let limit = self.policy.limited_to(query.limit).top_n;
        self.cache
            .get_or_compute(&query.user_id, &query.context)
            .await
            .limited(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySnapshotStore;
    use crate::application::recommendation::RecommendationSource;
    use crate::domain::foundation::{DomainError, ErrorCode, OpportunityId, Timestamp, UnitScore};
    use crate::domain::matching::FactorBreakdown;
    use crate::domain::ranking::RankedOpportunity;
    use async_trait::async_trait;

    struct FixedSource {
        items: usize,
        fail: bool,
    }

    #[async_trait]
    impl RecommendationSource for FixedSource {
        async fn compute(
            &self,
            _user_id: &UserId,
            _context: &RecommendationContext,
            as_of: Timestamp,
        ) -> Result<Vec<RankedOpportunity>, DomainError> {
            if self.fail {
                return Err(DomainError::new(ErrorCode::ProfileNotFound, "Profile not found"));
            }
            Ok((0..self.items)
                .map(|i| RankedOpportunity {
                    opportunity_id: OpportunityId::new(),
                    score: UnitScore::new(0.9 - i as f64 * 0.01),
                    base_score: UnitScore::new(0.9 - i as f64 * 0.01),
                    adjustment: 1.0,
                    posted_at: as_of,
                    factors: FactorBreakdown::default(),
                })
                .collect())
        }
    }

    fn handler(items: usize, fail: bool) -> GetRecommendationsHandler {
        let cache = Arc::new(RecommendationCache::new(
            Arc::new(FixedSource { items, fail }),
            Arc::new(InMemorySnapshotStore::new()),
            3600,
        ));
        GetRecommendationsHandler::new(cache, RankingPolicy { min_score: 0.3, top_n: 5 })
    }

    fn query(limit: Option<usize>) -> GetRecommendationsQuery {
        GetRecommendationsQuery {
            user_id: UserId::new("student-1").unwrap(),
            context: RecommendationContext::default(),
            limit,
        }
    }

    #[tokio::test]
    async fn applies_requested_limit() {
        let result = handler(5, false).handle(query(Some(2))).await;
        assert_eq!(result.items.len(), 2);
    }

    #[tokio::test]
    async fn limit_is_capped_at_top_n() {
        let result = handler(5, false).handle(query(Some(50))).await;
        assert_eq!(result.items.len(), 5);
    }

    #[tokio::test]
    async fn missing_profile_yields_empty_stale_result() {
        let result = handler(5, true).handle(query(None)).await;
        assert!(result.stale);
        assert!(result.items.is_empty());
    }
}
