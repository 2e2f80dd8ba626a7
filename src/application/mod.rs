//! Application layer - services, commands, queries and handlers.
//!
//! Orchestrates domain operations and coordinates between ports. Command
//! handlers (record behavior, invalidate, refresh) are kept apart from the
//! read path (get recommendations).

pub mod handlers;
pub mod recommendation;

pub use recommendation::{
    BatchRefresher, BehaviorTracker, EnginePorts, EngineSettings, RecommendationCache,
    RecommendationEngine,
};
