//! Matching module - Profile normalization and content-based scoring.
//!
//! # Module Organization
//!
//! - `profile` - User profiles and opportunity records
//! - `weights` - Validated per-kind factor weights
//! - `normalizer` - Maps a (profile, opportunity) pair to factor values
//! - `scoring` - Deterministic weighted-sum scorer

mod normalizer;
mod profile;
mod scoring;
mod weights;

pub use normalizer::{
    expected_factors, FeatureVector, MissingDataWarning, ProfileNormalizer, NEUTRAL_VALUE,
};
pub use profile::{
    normalize_term, BehaviorSummary, Coordinates, ExperienceLevel, Location, Opportunity,
    OpportunityKind, UserProfile,
};
pub use scoring::{FactorBreakdown, FactorContribution, MatchScore, ScoringEngine};
pub use weights::{
    Factor, InvalidWeightConfiguration, WeightConfig, WeightSet, WEIGHT_SUM_TOLERANCE,
};
