//! Scoring Engine - weighted sum of normalized factors.
//!
//! `score` is a pure function of its inputs: the same vector and weights
//! always produce a bit-identical result, which the cache relies on.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::foundation::{OpportunityId, Timestamp, UnitScore, UserId};

use super::{Factor, FeatureVector, WeightConfig, WeightSet};

/// One factor's share of a match score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub factor: Factor,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
    pub defaulted: bool,
}

/// Per-factor explanation of a match score, in factor order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactorBreakdown(Vec<FactorContribution>);

impl FactorBreakdown {
    pub fn contributions(&self) -> &[FactorContribution] {
        &self.0
    }

    pub fn get(&self, factor: Factor) -> Option<&FactorContribution> {
        self.0.iter().find(|c| c.factor == factor)
    }
}

/// Score of one opportunity for one user. Recomputed, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    pub user_id: UserId,
    pub opportunity_id: OpportunityId,
    pub score: UnitScore,
    pub breakdown: FactorBreakdown,
    pub computed_at: Timestamp,
}

/// Weighted-sum scorer bound to a validated weight configuration.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    weights: Arc<WeightConfig>,
}

impl ScoringEngine {
    pub fn new(weights: WeightConfig) -> Self {
        Self {
            weights: Arc::new(weights),
        }
    }

    pub fn weights(&self) -> &WeightConfig {
        &self.weights
    }

    /// Weighted sum of `vector` under `weights`, clamped to [0, 1].
    pub fn score(vector: &FeatureVector, weights: &WeightSet) -> UnitScore {
        let total: f64 = weights
            .iter()
            .map(|(factor, weight)| weight * vector.value(factor))
            .sum();
        UnitScore::new(total)
    }

    /// Scores a vector with the weight set for its kind and explains it.
    pub fn evaluate(
        &self,
        user_id: &UserId,
        opportunity_id: OpportunityId,
        vector: &FeatureVector,
        computed_at: Timestamp,
    ) -> MatchScore {
        let weights = self.weights.for_kind(vector.kind);
        let breakdown = weights
            .iter()
            .map(|(factor, weight)| {
                let value = vector.value(factor);
                FactorContribution {
                    factor,
                    value,
                    weight,
                    contribution: weight * value,
                    defaulted: vector.is_missing(factor),
                }
            })
            .collect();

        MatchScore {
            user_id: user_id.clone(),
            opportunity_id,
            score: Self::score(vector, weights),
            breakdown: FactorBreakdown(breakdown),
            computed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::matching::{
        BehaviorSummary, ExperienceLevel, Location, Opportunity, OpportunityKind,
        ProfileNormalizer, UserProfile,
    };
    use proptest::prelude::*;

    fn as_of() -> Timestamp {
        Timestamp::parse_rfc3339("2025-02-01T00:00:00Z").unwrap()
    }

    fn engine() -> ScoringEngine {
        ScoringEngine::new(WeightConfig::default())
    }

    fn posting() -> Opportunity {
        Opportunity::new(OpportunityKind::Job, "Backend Intern", as_of().minus_days(1))
            .with_required_skills(["rust", "sql"])
            .with_preferred_majors(["computer science"])
            .with_min_experience(ExperienceLevel::Junior)
            .with_location(Location::named("Austin", "Texas", "US"))
            .with_industry("fintech")
    }

    #[test]
    fn perfect_profile_scores_one() {
        let profile = UserProfile::new(UserId::new("u").unwrap())
            .with_skills(["Rust", "SQL"])
            .with_major("Computer Science")
            .with_experience(ExperienceLevel::Senior)
            .with_location(Location::named("Austin", "Texas", "US"))
            .with_behavior(BehaviorSummary::default().with_engagement("fintech", 4));
        let opp = posting().with_reputation(1.0);

        let vector = ProfileNormalizer::new(&profile).normalize(&opp, &as_of()).unwrap();
        let result = engine().evaluate(&profile.user_id, opp.id, &vector, as_of());

        assert!((result.score.value() - 1.0).abs() < 1e-9, "got {}", result.score);
    }

    #[test]
    fn disjoint_profile_scores_zero() {
        let profile = UserProfile::new(UserId::new("u").unwrap())
            .with_skills(["painting"])
            .with_major("Art History")
            .with_experience(ExperienceLevel::Freshman)
            .with_location(Location::named("Lyon", "Auvergne", "FR"))
            .with_behavior(BehaviorSummary::default().with_engagement("museums", 2));
        let opp = posting().with_reputation(0.0);

        let vector = ProfileNormalizer::new(&profile).normalize(&opp, &as_of()).unwrap();
        let result = engine().evaluate(&profile.user_id, opp.id, &vector, as_of());

        assert!(result.score.value().abs() < 1e-9, "got {}", result.score);
    }

    #[test]
    fn breakdown_contributions_sum_to_score() {
        let vector = FeatureVector::from_values(
            OpportunityKind::Job,
            [(Factor::Skills, 2.0 / 3.0), (Factor::Major, 1.0)],
        );
        let result = engine().evaluate(&UserId::new("u").unwrap(), OpportunityId::new(), &vector, as_of());

        let total: f64 = result
            .breakdown
            .contributions()
            .iter()
            .map(|c| c.contribution)
            .sum();
        assert!((total - result.score.value()).abs() < 1e-12);
        assert_eq!(result.breakdown.get(Factor::Skills).unwrap().weight, 0.30);
        assert!(result.breakdown.get(Factor::Location).unwrap().defaulted);
    }

    #[test]
    fn mentor_vectors_use_mentor_weights() {
        let vector = FeatureVector::from_values(
            OpportunityKind::Mentor,
            Factor::ALL.iter().map(|f| (*f, 0.0)).chain([(Factor::Industry, 1.0)]),
        );
        let result = engine().evaluate(&UserId::new("u").unwrap(), OpportunityId::new(), &vector, as_of());
        assert!((result.score.value() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn score_is_bit_identical_across_calls() {
        let vector = FeatureVector::from_values(
            OpportunityKind::Job,
            [
                (Factor::Skills, 0.6667),
                (Factor::Major, 1.0),
                (Factor::Experience, 0.5),
                (Factor::Location, 0.7),
                (Factor::Reputation, 0.33),
                (Factor::Behavior, 0.1),
            ],
        );
        let weights = WeightSet::default_job();

        let first = ScoringEngine::score(&vector, &weights).value().to_bits();
        for _ in 0..100 {
            assert_eq!(ScoringEngine::score(&vector, &weights).value().to_bits(), first);
        }
    }

    proptest! {
        #[test]
        fn score_stays_in_unit_interval(values in prop::collection::vec(-1.0f64..2.0, 9)) {
            let vector = FeatureVector::from_values(
                OpportunityKind::Job,
                Factor::ALL.iter().copied().zip(values.iter().copied()),
            );
            let score = ScoringEngine::score(&vector, &WeightSet::default_job()).value();
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn score_is_deterministic(values in prop::collection::vec(0.0f64..1.0, 9)) {
            let vector = FeatureVector::from_values(
                OpportunityKind::Mentor,
                Factor::ALL.iter().copied().zip(values.iter().copied()),
            );
            let weights = WeightSet::default_mentor();
            let a = ScoringEngine::score(&vector, &weights).value();
            let b = ScoringEngine::score(&vector.clone(), &weights).value();
            prop_assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
