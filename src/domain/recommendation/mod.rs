//! Recommendation module - Results, request context, and cache lifecycle.

mod cache_state;
mod context;
mod result;

pub use cache_state::CacheState;
pub use context::RecommendationContext;
pub use result::{CachedRecommendationRecord, RecommendationResult};
