//! HTTP handlers for recommendation endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Json, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::recommendation::{
    GetRecommendationsHandler, GetRecommendationsQuery, InvalidateCacheCommand,
    InvalidateCacheHandler, RecordBehaviorCommand, RecordBehaviorHandler, RefreshAllCommand,
    RefreshAllHandler,
};
use crate::application::recommendation::{RecommendationEngine, RecordOutcome};
use crate::domain::behavior::BehaviorAction;
use crate::domain::foundation::{OpportunityId, UserId};
use crate::domain::matching::OpportunityKind;
use crate::domain::recommendation::RecommendationContext;

use super::dto::{
    ErrorResponse, InvalidateCacheRequest, RecommendationsParams, RecommendationsResponse,
    RecordBehaviorRequest, RecordBehaviorResponse, StatsResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing the running engine.
#[derive(Clone)]
pub struct RecommendationAppState {
    pub engine: Arc<RecommendationEngine>,
}

impl RecommendationAppState {
    pub fn new(engine: Arc<RecommendationEngine>) -> Self {
        Self { engine }
    }

    pub fn get_recommendations_handler(&self) -> GetRecommendationsHandler {
        GetRecommendationsHandler::new(
            self.engine.cache().clone(),
            self.engine.settings().ranking,
        )
    }

    pub fn record_behavior_handler(&self) -> RecordBehaviorHandler {
        RecordBehaviorHandler::new(self.engine.tracker().clone())
    }

    pub fn invalidate_cache_handler(&self) -> InvalidateCacheHandler {
        InvalidateCacheHandler::new(self.engine.cache().clone())
    }

    pub fn refresh_all_handler(&self) -> RefreshAllHandler {
        RefreshAllHandler::new(
            self.engine.refresher().clone(),
            self.engine.shutdown_signal(),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context
// ════════════════════════════════════════════════════════════════════════════════

/// Caller identity taken from the `X-User-Id` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::unauthorized("X-User-Id header is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| UserId::new(s).ok())
            .ok_or(AuthenticationRequired)?;

        Ok(AuthenticatedUser { user_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/recommendations - Ranked recommendations for the caller
pub async fn get_recommendations(
    State(state): State<RecommendationAppState>,
    user: AuthenticatedUser,
    Query(params): Query<RecommendationsParams>,
) -> Result<impl IntoResponse, RecommendationApiError> {
    let kind = params
        .kind
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .map(str::parse::<OpportunityKind>)
        .transpose()
        .map_err(|e| RecommendationApiError::BadRequest(e.to_string()))?;

    let query = GetRecommendationsQuery {
        user_id: user.user_id,
        context: RecommendationContext::new(kind, params.region.as_deref()),
        limit: params.limit,
    };
    let result = state.get_recommendations_handler().handle(query).await;

    Ok((StatusCode::OK, Json(RecommendationsResponse::from(result))))
}

/// GET /api/admin/recommendations/stats - Cache and tracker counters
pub async fn get_stats(State(state): State<RecommendationAppState>) -> impl IntoResponse {
    Json(StatsResponse::from(state.engine.stats()))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/behavior - Record an interaction (fire-and-forget)
pub async fn record_behavior(
    State(state): State<RecommendationAppState>,
    user: AuthenticatedUser,
    Json(request): Json<RecordBehaviorRequest>,
) -> Result<impl IntoResponse, RecommendationApiError> {
    let opportunity_id: OpportunityId = request
        .opportunity_id
        .parse()
        .map_err(|_| RecommendationApiError::BadRequest("Invalid opportunity ID format".to_string()))?;
    let action: BehaviorAction = request
        .action
        .parse()
        .map_err(|e: crate::domain::foundation::ValidationError| {
            RecommendationApiError::BadRequest(e.to_string())
        })?;

    let result = state.record_behavior_handler().handle(RecordBehaviorCommand {
        user_id: user.user_id,
        opportunity_id,
        action,
    });

    let status = match result.outcome {
        RecordOutcome::Accepted => "accepted",
        RecordOutcome::Duplicate => "duplicate",
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(RecordBehaviorResponse {
            status: status.to_string(),
        }),
    ))
}

/// POST /api/admin/recommendations/invalidate - Mark a user's results stale
pub async fn invalidate_cache(
    State(state): State<RecommendationAppState>,
    Json(request): Json<InvalidateCacheRequest>,
) -> Result<impl IntoResponse, RecommendationApiError> {
    let user_id = UserId::new(request.user_id)
        .map_err(|e| RecommendationApiError::BadRequest(e.to_string()))?;

    let mut cmd = InvalidateCacheCommand::new(user_id);
    if request.purge {
        cmd = cmd.purging();
    }
    state.invalidate_cache_handler().handle(cmd).await;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/recommendations/refresh - Refresh every active user now
pub async fn refresh_all(
    State(state): State<RecommendationAppState>,
) -> Result<impl IntoResponse, RecommendationApiError> {
    let report = state
        .refresh_all_handler()
        .handle(RefreshAllCommand)
        .await
        .map_err(|e| RecommendationApiError::Internal(e.to_string()))?;

    Ok((StatusCode::OK, Json(report)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts failures to HTTP responses.
#[derive(Debug)]
pub enum RecommendationApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for RecommendationApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            RecommendationApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::bad_request(msg))
            }
            RecommendationApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Recommendation API failure");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::internal(msg))
            }
        };

        (status, Json(error)).into_response()
    }
}
