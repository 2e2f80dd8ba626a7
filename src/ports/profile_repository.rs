//! ProfileRepository port - read access to profiles and opportunities.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::matching::{normalize_term, Opportunity, OpportunityKind, UserProfile};
use crate::domain::recommendation::RecommendationContext;

/// Narrows the opportunity pool fetched for a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpportunityFilter {
    pub kind: Option<OpportunityKind>,
    /// Normalized region; remote opportunities always pass.
    pub region: Option<String>,
    /// Excludes opportunities whose deadline is not after this instant.
    pub active_at: Option<Timestamp>,
}

impl OpportunityFilter {
    pub fn for_context(context: &RecommendationContext, as_of: Timestamp) -> Self {
        Self {
            kind: context.kind,
            region: context.region.clone(),
            active_at: Some(as_of),
        }
    }

    /// In-process evaluation, for adapters that cannot push the filter down.
    pub fn matches(&self, opportunity: &Opportunity) -> bool {
        if let Some(kind) = self.kind {
            if opportunity.kind != kind {
                return false;
            }
        }
        if let Some(region) = &self.region {
            let in_region = opportunity
                .location
                .as_ref()
                .and_then(|l| l.region.as_deref())
                .map(|r| &normalize_term(r) == region)
                .unwrap_or(false);
            if !opportunity.remote && !in_region {
                return false;
            }
        }
        if let Some(as_of) = &self.active_at {
            if opportunity.is_expired(as_of) {
                return false;
            }
        }
        true
    }
}

/// Profiles and opportunities owned by the surrounding system.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Find a user's profile.
    async fn get(&self, user_id: &UserId) -> Result<Option<UserProfile>, DomainError>;

    /// Opportunities matching a filter.
    async fn get_opportunities(
        &self,
        filter: &OpportunityFilter,
    ) -> Result<Vec<Opportunity>, DomainError>;

    /// Users eligible for background refresh.
    async fn list_active_users(&self) -> Result<Vec<UserId>, DomainError>;
}
