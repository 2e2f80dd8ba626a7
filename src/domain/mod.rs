//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `matching` - Profiles, opportunities, normalization, and scoring
//! - `behavior` - Append-only interaction events
//! - `collaborative` - Neighbor index and collaborative adjustment
//! - `ranking` - Thresholding and deterministic ordering
//! - `recommendation` - Results, request context, and cache lifecycle

pub mod behavior;
pub mod collaborative;
pub mod foundation;
pub mod matching;
pub mod ranking;
pub mod recommendation;
