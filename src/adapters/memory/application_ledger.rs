//! In-memory ApplicationLedger.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode, OpportunityId, UserId};
use crate::ports::ApplicationLedger;

#[derive(Debug, Default)]
pub struct InMemoryApplicationLedger {
    applied: RwLock<HashSet<(UserId, OpportunityId)>>,
    failing: RwLock<HashSet<OpportunityId>>,
    unavailable: AtomicBool,
}

impl InMemoryApplicationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_application(&self, user_id: UserId, opportunity_id: OpportunityId) {
        self.applied
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((user_id, opportunity_id));
    }

    // === Test Helpers ===

    /// Lookups for this opportunity fail.
    pub fn fail_lookups_for(&self, opportunity_id: OpportunityId) {
        self.failing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(opportunity_id);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ApplicationLedger for InMemoryApplicationLedger {
    async fn has_applied(
        &self,
        user_id: &UserId,
        opportunity_id: OpportunityId,
    ) -> Result<bool, DomainError> {
        let failing = self
            .failing
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&opportunity_id);
        if failing || self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::new(ErrorCode::DatabaseError, "ledger unavailable")
                .with_detail("opportunity_id", opportunity_id.to_string()));
        }

        Ok(self
            .applied
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(user_id.clone(), opportunity_id)))
    }
}
