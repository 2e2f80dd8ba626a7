//! Ranker - threshold, sort, truncate.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::domain::foundation::{OpportunityId, Timestamp, UnitScore, ValidationError};
use crate::domain::matching::FactorBreakdown;

/// Threshold and list length applied to every ranking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingPolicy {
    /// Inclusive lower bound on the final score.
    pub min_score: f64,
    pub top_n: usize,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            min_score: 0.30,
            top_n: 20,
        }
    }
}

impl RankingPolicy {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(ValidationError::out_of_range(
                "min_score",
                0.0,
                1.0,
                self.min_score,
            ));
        }
        if self.top_n == 0 {
            return Err(ValidationError::out_of_range("top_n", 1.0, f64::MAX, 0.0));
        }
        Ok(())
    }

    /// Same policy with a caller-requested limit, never above `top_n`.
    pub fn limited_to(&self, limit: Option<usize>) -> Self {
        let top_n = match limit {
            Some(limit) if limit > 0 => limit.min(self.top_n),
            _ => self.top_n,
        };
        Self { top_n, ..*self }
    }
}

/// A candidate after scoring and collaborative adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub opportunity_id: OpportunityId,
    pub posted_at: Timestamp,
    pub base_score: UnitScore,
    pub adjustment: f64,
    pub factors: FactorBreakdown,
}

/// An entry of a recommendation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedOpportunity {
    pub opportunity_id: OpportunityId,
    /// `base_score * adjustment`, clamped to [0, 1].
    pub score: UnitScore,
    pub base_score: UnitScore,
    pub adjustment: f64,
    pub posted_at: Timestamp,
    /// How `base_score` was reached; empty when rebuilt from a snapshot.
    #[serde(default)]
    pub factors: FactorBreakdown,
}

impl RankedOpportunity {
    /// Total order used for ranking.
    ///
    /// Final score descending, then adjustment descending, then most
    /// recently posted, then opportunity id for full determinism.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .value()
            .total_cmp(&self.score.value())
            .then_with(|| other.adjustment.total_cmp(&self.adjustment))
            .then_with(|| other.posted_at.cmp(&self.posted_at))
            .then_with(|| self.opportunity_id.cmp(&other.opportunity_id))
    }
}

/// Stateless ranking functions.
pub struct Ranker;

impl Ranker {
    /// Ranks candidates under `policy`.
    ///
    /// # Edge Cases
    /// - Empty input: returns an empty list
    /// - Score exactly at the threshold: kept
    /// - NaN adjustment: treated as neutral (1.0)
    pub fn rank(
        candidates: impl IntoIterator<Item = ScoredCandidate>,
        policy: &RankingPolicy,
    ) -> Vec<RankedOpportunity> {
        let mut ranked: Vec<RankedOpportunity> = candidates
            .into_iter()
            .map(|c| {
                let adjustment = if c.adjustment.is_finite() { c.adjustment } else { 1.0 };
                RankedOpportunity {
                    opportunity_id: c.opportunity_id,
                    score: UnitScore::new(c.base_score.value() * adjustment),
                    base_score: c.base_score,
                    adjustment,
                    posted_at: c.posted_at,
                    factors: c.factors,
                }
            })
            .filter(|r| r.score.value() >= policy.min_score)
            .collect();

        ranked.sort_by(RankedOpportunity::rank_cmp);
        ranked.truncate(policy.top_n);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(score: f64, adjustment: f64, posted: &str) -> ScoredCandidate {
        ScoredCandidate {
            opportunity_id: OpportunityId::new(),
            posted_at: Timestamp::parse_rfc3339(posted).unwrap(),
            base_score: UnitScore::new(score),
            adjustment,
            factors: FactorBreakdown::default(),
        }
    }

    fn scores(ranked: &[RankedOpportunity]) -> Vec<f64> {
        ranked.iter().map(|r| r.score.value()).collect()
    }

    #[test]
    fn threshold_drops_low_scores_and_sorts_descending() {
        let ranked = Ranker::rank(
            [0.45, 0.12, 0.31, 0.29]
                .into_iter()
                .map(|s| candidate(s, 1.0, "2025-01-10T00:00:00Z")),
            &RankingPolicy::default(),
        );

        assert_eq!(scores(&ranked), vec![0.45, 0.31]);
    }

    #[test]
    fn ties_prefer_more_recent_posting() {
        let older = candidate(0.6, 1.0, "2025-01-10T00:00:00Z");
        let newer = candidate(0.6, 1.0, "2025-01-15T00:00:00Z");
        let newer_id = newer.opportunity_id;

        let ranked = Ranker::rank([older, newer], &RankingPolicy::default());

        assert_eq!(ranked[0].opportunity_id, newer_id);
    }

    #[test]
    fn ties_prefer_higher_adjustment_before_recency() {
        // Both finalize to 0.6.
        let boosted = candidate(0.5, 1.2, "2025-01-01T00:00:00Z");
        let plain = candidate(0.6, 1.0, "2025-01-20T00:00:00Z");
        let boosted_id = boosted.opportunity_id;

        let ranked = Ranker::rank([plain, boosted], &RankingPolicy::default());

        assert!((ranked[0].score.value() - ranked[1].score.value()).abs() < 1e-12);
        assert_eq!(ranked[0].opportunity_id, boosted_id);
    }

    #[test]
    fn final_score_is_clamped() {
        let ranked = Ranker::rank(
            [candidate(0.9, 1.3, "2025-01-10T00:00:00Z")],
            &RankingPolicy::default(),
        );
        assert_eq!(ranked[0].score.value(), 1.0);
    }

    #[test]
    fn truncates_to_top_n() {
        let policy = RankingPolicy {
            min_score: 0.0,
            top_n: 3,
        };
        let ranked = Ranker::rank(
            (0..10).map(|i| candidate(i as f64 / 10.0, 1.0, "2025-01-10T00:00:00Z")),
            &policy,
        );
        assert_eq!(scores(&ranked), vec![0.9, 0.8, 0.7]);
    }

    #[test]
    fn ordering_is_reproducible() {
        let input: Vec<ScoredCandidate> = (0..8)
            .map(|_| candidate(0.5, 1.0, "2025-01-10T00:00:00Z"))
            .collect();
        let a = Ranker::rank(input.clone(), &RankingPolicy::default());
        let b = Ranker::rank(input.into_iter().rev(), &RankingPolicy::default());
        assert_eq!(a, b);
    }

    #[test]
    fn requested_limit_never_exceeds_top_n() {
        let policy = RankingPolicy::default();
        assert_eq!(policy.limited_to(Some(5)).top_n, 5);
        assert_eq!(policy.limited_to(Some(500)).top_n, 20);
        assert_eq!(policy.limited_to(Some(0)).top_n, 20);
        assert_eq!(policy.limited_to(None).top_n, 20);
    }

    #[test]
    fn empty_input_ranks_to_empty() {
        assert!(Ranker::rank(Vec::new(), &RankingPolicy::default()).is_empty());
    }
}
