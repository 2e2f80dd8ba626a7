//! In-memory BehaviorEventStore.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::domain::behavior::BehaviorEvent;
use crate::domain::foundation::{BehaviorEventId, DomainError, ErrorCode};
use crate::ports::BehaviorEventStore;

#[derive(Debug, Default)]
pub struct InMemoryBehaviorEventStore {
    events: RwLock<Vec<BehaviorEvent>>,
    seen: RwLock<HashSet<BehaviorEventId>>,
    unavailable: AtomicBool,
}

impl InMemoryBehaviorEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    pub fn events(&self) -> Vec<BehaviorEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl BehaviorEventStore for InMemoryBehaviorEventStore {
    async fn append_batch(&self, batch: &[BehaviorEvent]) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "behavior store unavailable",
            ));
        }

        let mut seen = self.seen.write().unwrap_or_else(PoisonError::into_inner);
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        for event in batch {
            if seen.insert(event.id()) {
                events.push(event.clone());
            }
        }
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<BehaviorEvent>, DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "behavior store unavailable",
            ));
        }
        Ok(self.events())
    }
}
