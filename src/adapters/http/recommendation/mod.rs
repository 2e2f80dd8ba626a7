//! HTTP adapter for the recommendation engine.
//!
//! # Endpoints
//!
//! - `GET /api/recommendations` - Ranked recommendations for the caller
//! - `POST /api/behavior` - Record an interaction
//! - `POST /api/admin/recommendations/invalidate` - Invalidate a user's cache
//! - `POST /api/admin/recommendations/refresh` - Batch refresh on demand
//! - `GET /api/admin/recommendations/stats` - Counters

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{AuthenticatedUser, RecommendationAppState};
pub use routes::recommendation_router;
