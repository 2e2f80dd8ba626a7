//! PostgreSQL adapters.
//!
//! Table layout lives in `migrations/`.

mod application_ledger;
mod behavior_event_store;
mod profile_repository;

pub use application_ledger::PostgresApplicationLedger;
pub use behavior_event_store::PostgresBehaviorEventStore;
pub use profile_repository::PostgresProfileRepository;
