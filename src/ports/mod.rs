//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the matching engine and the outside world. Adapters implement these ports.
//!
//! ## Consumed
//!
//! - `ProfileRepository` - Profiles, opportunity pools, active users
//! - `ApplicationLedger` - Drives the applied-opportunity exclusion
//!
//! ## Owned
//!
//! - `BehaviorEventStore` - Durable behavior log
//! - `RecommendationSnapshotStore` - Persisted cache records

mod application_ledger;
mod behavior_event_store;
mod profile_repository;
mod recommendation_snapshot_store;

pub use application_ledger::ApplicationLedger;
pub use behavior_event_store::BehaviorEventStore;
pub use profile_repository::{OpportunityFilter, ProfileRepository};
pub use recommendation_snapshot_store::RecommendationSnapshotStore;
