//! Recommendation results and their persisted form.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{OpportunityId, Timestamp, UnitScore, UserId};
use crate::domain::matching::FactorBreakdown;
use crate::domain::ranking::RankedOpportunity;

/// Ranked list served to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub user_id: UserId,
    pub context_hash: String,
    pub items: Vec<RankedOpportunity>,
    pub generated_at: Timestamp,
    pub ttl_seconds: u64,
    /// Set when the payload was not freshly computed for this request.
    pub stale: bool,
}

impl RecommendationResult {
    pub fn new(
        user_id: UserId,
        context_hash: impl Into<String>,
        items: Vec<RankedOpportunity>,
        generated_at: Timestamp,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            user_id,
            context_hash: context_hash.into(),
            items,
            generated_at,
            ttl_seconds,
            stale: false,
        }
    }

    /// Placeholder served when nothing has ever been computed.
    pub fn empty_stale(user_id: UserId, context_hash: impl Into<String>, now: Timestamp) -> Self {
        Self {
            stale: true,
            ..Self::new(user_id, context_hash, Vec::new(), now, 0)
        }
    }

    pub fn expires_at(&self) -> Timestamp {
        self.generated_at.plus_secs(self.ttl_seconds)
    }

    /// True once the TTL has elapsed at `now`.
    pub fn is_expired(&self, now: &Timestamp) -> bool {
        !self.expires_at().is_after(now)
    }

    pub fn marked_stale(mut self) -> Self {
        self.stale = true;
        self
    }

    /// Copy truncated to at most `limit` items.
    pub fn limited(&self, limit: usize) -> Self {
        let mut out = self.clone();
        out.items.truncate(limit);
        out
    }

    pub fn opportunity_ids(&self) -> impl Iterator<Item = OpportunityId> + '_ {
        self.items.iter().map(|i| i.opportunity_id)
    }

    pub fn contains(&self, opportunity_id: OpportunityId) -> bool {
        self.items.iter().any(|i| i.opportunity_id == opportunity_id)
    }
}

/// Persisted shape keyed by `(user_id, context_hash)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRecommendationRecord {
    pub ranked_ids: Vec<OpportunityId>,
    pub scores: Vec<f64>,
    pub generated_at: Timestamp,
    pub ttl_seconds: u64,
    pub stale: bool,
}

impl CachedRecommendationRecord {
    pub fn from_result(result: &RecommendationResult) -> Self {
        Self {
            ranked_ids: result.opportunity_ids().collect(),
            scores: result.items.iter().map(|i| i.score.value()).collect(),
            generated_at: result.generated_at,
            ttl_seconds: result.ttl_seconds,
            stale: result.stale,
        }
    }

    /// Rebuilds a result. Only ids and final scores survive persistence;
    /// the adjustment reads as neutral, `posted_at` as `generated_at`, and
    /// the factor breakdown is empty.
    pub fn into_result(self, user_id: UserId, context_hash: impl Into<String>) -> RecommendationResult {
        let generated_at = self.generated_at;
        let items = self
            .ranked_ids
            .into_iter()
            .zip(self.scores)
            .map(|(opportunity_id, score)| RankedOpportunity {
                opportunity_id,
                score: UnitScore::new(score),
                base_score: UnitScore::new(score),
                adjustment: 1.0,
                posted_at: generated_at,
                factors: FactorBreakdown::default(),
            })
            .collect();

        RecommendationResult {
            user_id,
            context_hash: context_hash.into(),
            items,
            generated_at,
            ttl_seconds: self.ttl_seconds,
            stale: self.stale,
        }
    }
}
