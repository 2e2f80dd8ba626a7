//! Recommendation handlers.
//!
//! ## Queries
//! - Get ranked recommendations for a user and context
//!
//! ## Commands
//! - Record a behavior event
//! - Invalidate (or purge) a user's cached recommendations
//! - Refresh every active user

mod get_recommendations;
mod invalidate_cache;
mod record_behavior;
mod refresh_all;

pub use get_recommendations::{GetRecommendationsHandler, GetRecommendationsQuery};
pub use invalidate_cache::{InvalidateCacheCommand, InvalidateCacheHandler, InvalidateCacheResult};
pub use record_behavior::{RecordBehaviorCommand, RecordBehaviorHandler, RecordBehaviorResult};
pub use refresh_all::{RefreshAllCommand, RefreshAllHandler};
