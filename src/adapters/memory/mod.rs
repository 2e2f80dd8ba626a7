//! In-memory adapters for tests and local development.
//!
//! Locks recover from poisoning instead of panicking, so these adapters
//! are safe to run inside the service when no database is configured.

mod application_ledger;
mod behavior_event_store;
mod profile_repository;
mod snapshot_store;

pub use application_ledger::InMemoryApplicationLedger;
pub use behavior_event_store::InMemoryBehaviorEventStore;
pub use profile_repository::InMemoryProfileRepository;
pub use snapshot_store::InMemorySnapshotStore;
