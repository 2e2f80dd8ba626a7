//! HTTP adapters - REST API implementations.

pub mod recommendation;

pub use recommendation::{recommendation_router, RecommendationAppState};
