//! In-memory ProfileRepository.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode, OpportunityId, UserId};
use crate::domain::matching::{Opportunity, UserProfile};
use crate::ports::{OpportunityFilter, ProfileRepository};

/// Profiles and opportunities held in process memory.
///
/// # Example
///
/// ```ignore
/// let repo = InMemoryProfileRepository::new();
/// repo.insert_profile(profile);
/// repo.insert_opportunity(posting);
/// assert_eq!(repo.opportunity_fetches(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<BTreeMap<UserId, UserProfile>>,
    opportunities: RwLock<BTreeMap<OpportunityId, Opportunity>>,
    unavailable: AtomicBool,
    opportunity_fetches: AtomicUsize,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_profile(&self, profile: UserProfile) {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(profile.user_id.clone(), profile);
    }

    pub fn insert_opportunity(&self, opportunity: Opportunity) {
        self.opportunities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(opportunity.id, opportunity);
    }

    pub fn remove_opportunity(&self, id: OpportunityId) {
        self.opportunities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    // === Test Helpers ===

    /// Makes every call fail with a database error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `get_opportunities` calls served so far.
    pub fn opportunity_fetches(&self) -> usize {
        self.opportunity_fetches.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "profile store unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn get(&self, user_id: &UserId) -> Result<Option<UserProfile>, DomainError> {
        self.check_available()?;
        Ok(self
            .profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned())
    }

    async fn get_opportunities(
        &self,
        filter: &OpportunityFilter,
    ) -> Result<Vec<Opportunity>, DomainError> {
        self.opportunity_fetches.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .opportunities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect())
    }

    async fn list_active_users(&self) -> Result<Vec<UserId>, DomainError> {
        self.check_available()?;
        Ok(self
            .profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::matching::OpportunityKind;

    #[tokio::test]
    async fn filters_opportunities_by_kind() {
        let repo = InMemoryProfileRepository::new();
        repo.insert_opportunity(Opportunity::new(OpportunityKind::Job, "a", Timestamp::now()));
        repo.insert_opportunity(Opportunity::new(OpportunityKind::Mentor, "b", Timestamp::now()));

        let filter = OpportunityFilter {
            kind: Some(OpportunityKind::Mentor),
            ..OpportunityFilter::default()
        };
        let found = repo.get_opportunities(&filter).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "b");
        assert_eq!(repo.opportunity_fetches(), 1);
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let repo = InMemoryProfileRepository::new();
        repo.set_unavailable(true);
        let err = repo.get(&UserId::new("u").unwrap()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[tokio::test]
    async fn lists_users_with_profiles() {
        let repo = InMemoryProfileRepository::new();
        repo.insert_profile(UserProfile::new(UserId::new("b").unwrap()));
        repo.insert_profile(UserProfile::new(UserId::new("a").unwrap()));

        let users = repo.list_active_users().await.unwrap();
        assert_eq!(users, vec![UserId::new("a").unwrap(), UserId::new("b").unwrap()]);
    }
}
