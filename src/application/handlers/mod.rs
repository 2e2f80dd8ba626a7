//! Application handlers.
//!
//! Command and query handlers that orchestrate the recommendation services.

pub mod recommendation;

pub use recommendation::{
    GetRecommendationsHandler, GetRecommendationsQuery, InvalidateCacheCommand,
    InvalidateCacheHandler, InvalidateCacheResult, RecordBehaviorCommand, RecordBehaviorHandler,
    RecordBehaviorResult, RefreshAllCommand, RefreshAllHandler,
};
