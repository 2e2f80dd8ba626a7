//! Full recommendation pipeline: Normalizer -> Scoring -> CF -> Ranker.
//!
//! Per-item failures are isolated. A malformed opportunity or a failed
//! ledger lookup drops that candidate with a warning; only failures that
//! affect the whole request (profile or pool unavailable) are returned.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

use crate::domain::collaborative::{CollaborativeFilter, Neighborhood};
use crate::domain::foundation::{DomainError, ErrorCode, OpportunityId, Timestamp, UserId};
use crate::domain::matching::{Opportunity, ProfileNormalizer, ScoringEngine};
use crate::domain::ranking::{RankedOpportunity, Ranker, RankingPolicy, ScoredCandidate};
use crate::domain::recommendation::RecommendationContext;
use crate::ports::{ApplicationLedger, OpportunityFilter, ProfileRepository};

/// Anything that can produce a ranked list for a user.
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    async fn compute(
        &self,
        user_id: &UserId,
        context: &RecommendationContext,
        as_of: Timestamp,
    ) -> Result<Vec<RankedOpportunity>, DomainError>;

    /// Drops items that became ineligible after they were ranked, such as
    /// opportunities the user has since applied to. Applied to payloads
    /// served without a fresh compute.
    async fn retain_eligible(
        &self,
        _user_id: &UserId,
        items: Vec<RankedOpportunity>,
    ) -> Vec<RankedOpportunity> {
        items
    }
}

pub struct RecommendationPipeline {
    profiles: Arc<dyn ProfileRepository>,
    ledger: Arc<dyn ApplicationLedger>,
    scoring: ScoringEngine,
    collaborative: CollaborativeFilter,
    policy: RankingPolicy,
}

impl RecommendationPipeline {
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        ledger: Arc<dyn ApplicationLedger>,
        scoring: ScoringEngine,
        collaborative: CollaborativeFilter,
        policy: RankingPolicy,
    ) -> Self {
        Self {
            profiles,
            ledger,
            scoring,
            collaborative,
            policy,
        }
    }

    pub fn policy(&self) -> &RankingPolicy {
        &self.policy
    }

    /// Drops opportunities the user applied to or that already closed.
    async fn eligible(
        &self,
        user_id: &UserId,
        pool: Vec<Opportunity>,
        neighborhood: &Neighborhood,
        as_of: &Timestamp,
    ) -> Vec<Opportunity> {
        let open: Vec<Opportunity> = pool
            .into_iter()
            .filter(|o| !o.is_expired(as_of) && !neighborhood.has_applied(o.id))
            .collect();

        let ids: Vec<OpportunityId> = open.iter().map(|o| o.id).collect();
        let keep = self.not_in_ledger(user_id, &ids).await;
        open.into_iter()
            .zip(keep)
            .filter_map(|(opportunity, keep)| keep.then_some(opportunity))
            .collect()
    }

    /// One flag per id: true when the ledger confirms no application.
    /// A failed lookup counts as applied.
    async fn not_in_ledger(&self, user_id: &UserId, ids: &[OpportunityId]) -> Vec<bool> {
        let lookups = join_all(ids.iter().map(|id| self.ledger.has_applied(user_id, *id))).await;

        ids.iter()
            .zip(lookups)
            .map(|(opportunity_id, applied)| match applied {
                Ok(applied) => !applied,
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        opportunity_id = %opportunity_id,
                        error = %e,
                        "Ledger lookup failed, dropping candidate"
                    );
                    false
                }
            })
            .collect()
    }
}

#[async_trait]
impl RecommendationSource for RecommendationPipeline {
    async fn compute(
        &self,
        user_id: &UserId,
        context: &RecommendationContext,
        as_of: Timestamp,
    ) -> Result<Vec<RankedOpportunity>, DomainError> {
        let profile = self.profiles.get(user_id).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::ProfileNotFound, "Profile not found")
                .with_detail("user_id", user_id.to_string())
        })?;
        self.collaborative.index().upsert_profile(&profile);

        let pool = self
            .profiles
            .get_opportunities(&OpportunityFilter::for_context(context, as_of))
            .await?;
        let pool_size = pool.len();

        let neighborhood = self.collaborative.neighborhood(&profile);
        let eligible = self
            .eligible(user_id, pool, &neighborhood, &as_of)
            .await;

        let normalizer = ProfileNormalizer::new(&profile);
        let candidates: Vec<ScoredCandidate> = eligible
            .iter()
            .filter_map(|opportunity| {
                let vector = match normalizer.normalize(opportunity, &as_of) {
                    Ok(vector) => vector,
                    Err(e) => {
                        tracing::warn!(
                            user_id = %user_id,
                            opportunity_id = %opportunity.id,
                            error = %e,
                            "Dropping malformed opportunity"
                        );
                        return None;
                    }
                };
                let matched = self.scoring.evaluate(user_id, opportunity.id, &vector, as_of);
                Some(ScoredCandidate {
                    opportunity_id: matched.opportunity_id,
                    posted_at: opportunity.posted_at,
                    base_score: matched.score,
                    adjustment: neighborhood.adjustment_for(opportunity.id).factor,
                    factors: matched.breakdown,
                })
            })
            .collect();

        let ranked = Ranker::rank(candidates, &self.policy);
        tracing::debug!(
            user_id = %user_id,
            pool = pool_size,
            eligible = eligible.len(),
            ranked = ranked.len(),
            "Recommendation pipeline completed"
        );
        Ok(ranked)
    }

    async fn retain_eligible(
        &self,
        user_id: &UserId,
        items: Vec<RankedOpportunity>,
    ) -> Vec<RankedOpportunity> {
        let index = self.collaborative.index().snapshot();
        let unapplied: Vec<RankedOpportunity> = items
            .into_iter()
            .filter(|item| !index.has_applied(user_id, item.opportunity_id))
            .collect();

        let ids: Vec<OpportunityId> = unapplied.iter().map(|i| i.opportunity_id).collect();
        let keep = self.not_in_ledger(user_id, &ids).await;
        unapplied
            .into_iter()
            .zip(keep)
            .filter_map(|(item, keep)| keep.then_some(item))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryApplicationLedger, InMemoryProfileRepository};
    use crate::domain::behavior::{BehaviorAction, BehaviorEvent};
    use crate::domain::collaborative::{NeighborIndex, NeighborSettings};
    use crate::domain::matching::{Factor, OpportunityKind, UserProfile, WeightConfig};

    struct Fixture {
        repo: Arc<InMemoryProfileRepository>,
        ledger: Arc<InMemoryApplicationLedger>,
        index: Arc<NeighborIndex>,
        pipeline: RecommendationPipeline,
    }

    fn as_of() -> Timestamp {
        Timestamp::parse_rfc3339("2025-02-01T00:00:00Z").unwrap()
    }

    fn user() -> UserId {
        UserId::new("student-1").unwrap()
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryProfileRepository::new());
        let ledger = Arc::new(InMemoryApplicationLedger::new());
        let index = Arc::new(NeighborIndex::new());
        repo.insert_profile(
            UserProfile::new(user())
                .with_skills(["python", "sql"])
                .with_major("data science"),
        );
        let pipeline = RecommendationPipeline::new(
            repo.clone(),
            ledger.clone(),
            ScoringEngine::new(WeightConfig::default()),
            CollaborativeFilter::new(index.clone(), NeighborSettings::default()),
            RankingPolicy {
                min_score: 0.0,
                top_n: 20,
            },
        );
        Fixture {
            repo,
            ledger,
            index,
            pipeline,
        }
    }

    fn add_job(repo: &InMemoryProfileRepository, skills: &[&str]) -> OpportunityId {
        let opp = Opportunity::new(OpportunityKind::Job, "Job", as_of().minus_days(2))
            .with_required_skills(skills.iter().copied());
        let id = opp.id;
        repo.insert_opportunity(opp);
        id
    }

    fn ids(ranked: &[RankedOpportunity]) -> Vec<OpportunityId> {
        ranked.iter().map(|r| r.opportunity_id).collect()
    }

    #[tokio::test]
    async fn ranks_better_skill_match_first() {
        let f = fixture();
        let weak = add_job(&f.repo, &["go", "rust"]);
        let strong = add_job(&f.repo, &["python", "sql"]);

        let ranked = f
            .pipeline
            .compute(&user(), &RecommendationContext::default(), as_of())
            .await
            .unwrap();

        assert_eq!(ids(&ranked), vec![strong, weak]);
    }

    #[tokio::test]
    async fn excludes_ledger_applications() {
        let f = fixture();
        let applied = add_job(&f.repo, &["python"]);
        let open = add_job(&f.repo, &["python"]);
        f.ledger.record_application(user(), applied);

        let ranked = f
            .pipeline
            .compute(&user(), &RecommendationContext::default(), as_of())
            .await
            .unwrap();

        assert_eq!(ids(&ranked), vec![open]);
    }

    #[tokio::test]
    async fn excludes_applications_seen_in_behavior() {
        let f = fixture();
        let applied = add_job(&f.repo, &["python"]);
        f.index.apply_events(&[BehaviorEvent::new(
            user(),
            applied,
            BehaviorAction::Apply,
            as_of(),
        )]);

        let ranked = f
            .pipeline
            .compute(&user(), &RecommendationContext::default(), as_of())
            .await
            .unwrap();

        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn ledger_error_drops_only_that_candidate() {
        let f = fixture();
        let broken = add_job(&f.repo, &["python"]);
        let fine = add_job(&f.repo, &["python"]);
        f.ledger.fail_lookups_for(broken);

        let ranked = f
            .pipeline
            .compute(&user(), &RecommendationContext::default(), as_of())
            .await
            .unwrap();

        assert_eq!(ids(&ranked), vec![fine]);
    }

    #[tokio::test]
    async fn malformed_opportunity_is_isolated() {
        let f = fixture();
        f.repo.insert_opportunity(
            Opportunity::new(OpportunityKind::Job, "Bad", as_of()).with_reputation(7.0),
        );
        let good = add_job(&f.repo, &["python"]);

        let ranked = f
            .pipeline
            .compute(&user(), &RecommendationContext::default(), as_of())
            .await
            .unwrap();

        assert_eq!(ids(&ranked), vec![good]);
    }

    #[tokio::test]
    async fn unknown_profile_is_an_error() {
        let f = fixture();
        let err = f
            .pipeline
            .compute(
                &UserId::new("ghost").unwrap(),
                &RecommendationContext::default(),
                as_of(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ProfileNotFound);
    }

    #[tokio::test]
    async fn sparse_neighborhood_leaves_scores_unadjusted() {
        let f = fixture();
        add_job(&f.repo, &["python"]);

        let ranked = f
            .pipeline
            .compute(&user(), &RecommendationContext::default(), as_of())
            .await
            .unwrap();

        assert!(ranked.iter().all(|r| r.adjustment == 1.0));
    }

    #[tokio::test]
    async fn ranked_items_explain_their_base_score() {
        let f = fixture();
        add_job(&f.repo, &["python", "sql", "go"]);

        let ranked = f
            .pipeline
            .compute(&user(), &RecommendationContext::default(), as_of())
            .await
            .unwrap();

        let factors = &ranked[0].factors;
        let skills = factors.get(Factor::Skills).unwrap();
        assert!((skills.value - 2.0 / 3.0).abs() < 1e-9);
        let total: f64 = factors.contributions().iter().map(|c| c.contribution).sum();
        assert!((total - ranked[0].base_score.value()).abs() < 1e-9);
    }

    #[tokio::test]
    async fn retain_eligible_drops_later_applications() {
        let f = fixture();
        let via_behavior = add_job(&f.repo, &["python"]);
        let via_ledger = add_job(&f.repo, &["python"]);
        let open = add_job(&f.repo, &["python"]);
        let ranked = f
            .pipeline
            .compute(&user(), &RecommendationContext::default(), as_of())
            .await
            .unwrap();
        assert_eq!(ranked.len(), 3);

        f.index.apply_events(&[BehaviorEvent::new(
            user(),
            via_behavior,
            BehaviorAction::Apply,
            as_of(),
        )]);
        f.ledger.record_application(user(), via_ledger);
        let kept = f.pipeline.retain_eligible(&user(), ranked).await;

        assert_eq!(ids(&kept), vec![open]);
    }

    #[tokio::test]
    async fn retain_eligible_drops_items_on_ledger_error() {
        let f = fixture();
        let broken = add_job(&f.repo, &["python"]);
        let fine = add_job(&f.repo, &["python"]);
        let ranked = f
            .pipeline
            .compute(&user(), &RecommendationContext::default(), as_of())
            .await
            .unwrap();

        f.ledger.fail_lookups_for(broken);
        let kept = f.pipeline.retain_eligible(&user(), ranked).await;

        assert_eq!(ids(&kept), vec![fine]);
    }
}
