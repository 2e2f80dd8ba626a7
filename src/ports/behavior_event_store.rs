//! BehaviorEventStore port - durable append-only event log.

use async_trait::async_trait;

use crate::domain::behavior::BehaviorEvent;
use crate::domain::foundation::DomainError;

#[async_trait]
pub trait BehaviorEventStore: Send + Sync {
    /// Appends events in order. Events already stored (same id) are skipped.
    async fn append_batch(&self, events: &[BehaviorEvent]) -> Result<(), DomainError>;

    /// All stored events, oldest first. Used to seed the neighbor index.
    async fn load_all(&self) -> Result<Vec<BehaviorEvent>, DomainError>;
}
