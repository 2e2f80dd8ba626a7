//! Recommendation services: pipeline, coalescing cache, behavior ingestion
//! and batch refresh, assembled by [`RecommendationEngine`].

mod batch_refresh;
mod behavior_tracker;
mod cache;
mod engine;
mod pipeline;

pub use batch_refresh::{BatchRefresher, RefreshReport};
pub use behavior_tracker::{
    BehaviorConsumer, BehaviorTracker, RecordOutcome, TrackerSettings, TrackerStats,
};
pub use cache::{CacheStats, RecommendationCache};
pub use engine::{EnginePorts, EngineSettings, EngineStats, RecommendationEngine};
pub use pipeline::{RecommendationPipeline, RecommendationSource};
