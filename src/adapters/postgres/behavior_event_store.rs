//! PostgreSQL implementation of BehaviorEventStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::behavior::{BehaviorAction, BehaviorEvent};
use crate::domain::foundation::{
    BehaviorEventId, DomainError, ErrorCode, OpportunityId, Timestamp, UserId,
};
use crate::ports::BehaviorEventStore;

/// Append-only `behavior_events` table.
#[derive(Clone)]
pub struct PostgresBehaviorEventStore {
    pool: PgPool,
}

impl PostgresBehaviorEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: uuid::Uuid,
    user_id: String,
    opportunity_id: uuid::Uuid,
    action: String,
    occurred_at: DateTime<Utc>,
}

impl EventRow {
    fn into_event(self) -> Result<BehaviorEvent, DomainError> {
        let user_id = UserId::new(self.user_id).map_err(|e| {
            DomainError::new(ErrorCode::InvalidFormat, format!("Invalid user_id: {}", e))
        })?;
        let action: BehaviorAction = self.action.parse()?;
        Ok(BehaviorEvent::reconstitute(
            BehaviorEventId::from_uuid(self.id),
            user_id,
            OpportunityId::from_uuid(self.opportunity_id),
            action,
            Timestamp::from_datetime(self.occurred_at),
        ))
    }
}

#[async_trait]
impl BehaviorEventStore for PostgresBehaviorEventStore {
    async fn append_batch(&self, events: &[BehaviorEvent]) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::database(format!("Failed to start transaction: {}", e))
        })?;

        for event in events {
            sqlx::query(
                r#"
                INSERT INTO behavior_events (id, user_id, opportunity_id, action, occurred_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(event.id().as_uuid())
            .bind(event.user_id().as_str())
            .bind(event.opportunity_id().as_uuid())
            .bind(event.action().as_str())
            .bind(event.occurred_at().as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database(format!("Failed to insert behavior event: {}", e)))?;
        }

        tx.commit().await.map_err(|e| {
            DomainError::database(format!("Failed to commit behavior events: {}", e))
        })?;

        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<BehaviorEvent>, DomainError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, user_id, opportunity_id, action, occurred_at
            FROM behavior_events
            ORDER BY occurred_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DomainError::database)?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match row.into_event() {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!(event_id = %id, error = %e, "Skipping unreadable behavior event"),
            }
        }
        Ok(events)
    }
}
