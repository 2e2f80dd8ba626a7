//! PostgreSQL implementation of ApplicationLedger.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, OpportunityId, UserId};
use crate::ports::ApplicationLedger;

/// Reads the `applications` table owned by the application service.
#[derive(Clone)]
pub struct PostgresApplicationLedger {
    pool: PgPool,
}

impl PostgresApplicationLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationLedger for PostgresApplicationLedger {
    async fn has_applied(
        &self,
        user_id: &UserId,
        opportunity_id: OpportunityId,
    ) -> Result<bool, DomainError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM applications
                WHERE user_id = $1 AND opportunity_id = $2
            )
            "#,
        )
        .bind(user_id.as_str())
        .bind(opportunity_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(DomainError::database)?;

        Ok(exists)
    }
}
