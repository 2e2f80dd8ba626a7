//! Collaborative module - "Students like you" score adjustments.
//!
//! # Module Organization
//!
//! - `index` - Copy-on-write inverted index of user signals
//! - `filter` - Nearest-neighbor search and multiplicative adjustment

mod filter;
mod index;

pub use filter::{Adjustment, CollaborativeFilter, InsufficientNeighborData, Neighbor, Neighborhood};
pub use index::{IndexSnapshot, NeighborIndex, NeighborSettings, SimilarityWeights};
