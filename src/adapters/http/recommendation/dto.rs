//! HTTP DTOs for recommendation endpoints.
//!
//! These types decouple the HTTP API from domain types, allowing independent evolution.

use serde::{Deserialize, Serialize};

use crate::application::recommendation::{CacheStats, EngineStats, TrackerStats};
use crate::domain::matching::FactorContribution;
use crate::domain::ranking::RankedOpportunity;
use crate::domain::recommendation::RecommendationResult;

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Query string for `GET /api/recommendations`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationsParams {
    pub kind: Option<String>,
    pub region: Option<String>,
    pub limit: Option<usize>,
}

/// Body of `POST /api/behavior`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordBehaviorRequest {
    pub opportunity_id: String,
    pub action: String,
}

/// Body of `POST /api/admin/recommendations/invalidate`.
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateCacheRequest {
    pub user_id: String,
    #[serde(default)]
    pub purge: bool,
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

/// One factor's share of an item's base score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorResponse {
    pub factor: String,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
    /// True when the input was missing and the neutral value was used.
    pub defaulted: bool,
}

impl From<&FactorContribution> for FactorResponse {
    fn from(c: &FactorContribution) -> Self {
        Self {
            factor: c.factor.as_str().to_string(),
            value: c.value,
            weight: c.weight,
            contribution: c.contribution,
            defaulted: c.defaulted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationItemResponse {
    pub opportunity_id: String,
    pub score: f64,
    pub base_score: f64,
    pub adjustment: f64,
    pub posted_at: String,
    pub factors: Vec<FactorResponse>,
}

impl From<&RankedOpportunity> for RecommendationItemResponse {
    fn from(item: &RankedOpportunity) -> Self {
        Self {
            opportunity_id: item.opportunity_id.to_string(),
            score: item.score.value(),
            base_score: item.base_score.value(),
            adjustment: item.adjustment,
            posted_at: item.posted_at.as_datetime().to_rfc3339(),
            factors: item.factors.contributions().iter().map(FactorResponse::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub user_id: String,
    pub context_hash: String,
    pub generated_at: String,
    pub ttl_seconds: u64,
    pub stale: bool,
    pub items: Vec<RecommendationItemResponse>,
}

impl From<RecommendationResult> for RecommendationsResponse {
    fn from(result: RecommendationResult) -> Self {
        Self {
            user_id: result.user_id.to_string(),
            context_hash: result.context_hash.clone(),
            generated_at: result.generated_at.as_datetime().to_rfc3339(),
            ttl_seconds: result.ttl_seconds,
            stale: result.stale,
            items: result.items.iter().map(Into::into).collect(),
        }
    }
}

/// Acknowledgement for an enqueued behavior event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordBehaviorResponse {
    /// `accepted` or `duplicate`.
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    pub tracker: TrackerStats,
    pub indexed_users: usize,
}

impl From<EngineStats> for StatsResponse {
    fn from(stats: EngineStats) -> Self {
        Self {
            cache: stats.cache,
            tracker: stats.tracker,
            indexed_users: stats.indexed_users,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Response DTO
// ════════════════════════════════════════════════════════════════════════════════

/// Standard error response for API errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}
