//! ApplicationLedger port - who applied to what.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OpportunityId, UserId};

/// Authoritative record of submitted applications.
#[async_trait]
pub trait ApplicationLedger: Send + Sync {
    async fn has_applied(
        &self,
        user_id: &UserId,
        opportunity_id: OpportunityId,
    ) -> Result<bool, DomainError>;
}
