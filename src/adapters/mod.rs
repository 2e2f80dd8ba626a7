//! Adapters - Implementations of port interfaces.
//!
//! - `memory` - in-process stores for tests and local development
//! - `postgres` - profiles, opportunities, ledger and behavior history
//! - `redis` - persisted recommendation snapshots
//! - `http` - the REST surface

pub mod http;
pub mod memory;
pub mod postgres;
pub mod redis;

pub use memory::{
    InMemoryApplicationLedger, InMemoryBehaviorEventStore, InMemoryProfileRepository,
    InMemorySnapshotStore,
};
pub use postgres::{PostgresApplicationLedger, PostgresBehaviorEventStore, PostgresProfileRepository};
pub use self::redis::RedisSnapshotStore;
