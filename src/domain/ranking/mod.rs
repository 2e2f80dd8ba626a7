//! Ranking module - Combines scores and adjustments into an ordered list.

mod ranker;

pub use ranker::{RankedOpportunity, Ranker, RankingPolicy, ScoredCandidate};
