//! Route configuration for recommendation endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    get_recommendations, get_stats, invalidate_cache, record_behavior, refresh_all,
    RecommendationAppState,
};

/// Creates the recommendation router with all endpoints.
///
/// Routes:
/// - `GET /api/recommendations?kind=&region=&limit=` - Ranked list for `X-User-Id`
/// - `POST /api/behavior` - Record an interaction, 202 Accepted
/// - `POST /api/admin/recommendations/invalidate` - Mark a user stale, 204
/// - `POST /api/admin/recommendations/refresh` - Run a batch refresh now
/// - `GET /api/admin/recommendations/stats` - Cache and tracker counters
pub fn recommendation_router() -> Router<RecommendationAppState> {
    Router::new()
        .route("/api/recommendations", get(get_recommendations))
        .route("/api/behavior", post(record_behavior))
        .route("/api/admin/recommendations/invalidate", post(invalidate_cache))
        .route("/api/admin/recommendations/refresh", post(refresh_all))
        .route("/api/admin/recommendations/stats", get(get_stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::recommendation::dto::{
        RecommendationsResponse, RecordBehaviorResponse,
    };
    use crate::adapters::memory::{
        InMemoryApplicationLedger, InMemoryBehaviorEventStore, InMemoryProfileRepository,
        InMemorySnapshotStore,
    };
    use crate::application::recommendation::{EnginePorts, EngineSettings, RecommendationEngine};
    use crate::domain::foundation::{Timestamp, UserId};
    use crate::domain::matching::{Opportunity, OpportunityKind, UserProfile, WeightConfig};
    use crate::domain::ranking::RankingPolicy;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    // ───────────────────────────────────────────────────────────────
    // Test setup
    // ───────────────────────────────────────────────────────────────

    fn app_with(repo: Arc<InMemoryProfileRepository>) -> Router {
        let settings = EngineSettings {
            ranking: RankingPolicy {
                min_score: 0.0,
                top_n: 20,
            },
            ..EngineSettings::default()
        };
        let engine = RecommendationEngine::new(
            settings,
            WeightConfig::default(),
            EnginePorts {
                profiles: repo,
                ledger: Arc::new(InMemoryApplicationLedger::new()),
                events: Arc::new(InMemoryBehaviorEventStore::new()),
                snapshots: Arc::new(InMemorySnapshotStore::new()),
            },
        )
        .unwrap();
        recommendation_router().with_state(RecommendationAppState::new(Arc::new(engine)))
    }

    fn seeded_repo() -> Arc<InMemoryProfileRepository> {
        let repo = Arc::new(InMemoryProfileRepository::new());
        repo.insert_profile(UserProfile::new(UserId::new("student-1").unwrap()).with_skills(["rust"]));
        for _ in 0..3 {
            repo.insert_opportunity(
                Opportunity::new(OpportunityKind::Job, "Intern", Timestamp::now().minus_days(1))
                    .with_required_skills(["rust"]),
            );
        }
        repo
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn recommendations_require_user_header() {
        let response = app_with(seeded_repo())
            .oneshot(
                Request::builder()
                    .uri("/api/recommendations")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn recommendations_respect_limit() {
        let response = app_with(seeded_repo())
            .oneshot(
                Request::builder()
                    .uri("/api/recommendations?kind=job&limit=2")
                    .header("X-User-Id", "student-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: RecommendationsResponse = body_json(response).await;
        assert_eq!(body.items.len(), 2);
        assert!(!body.stale);
        let skills = body.items[0]
            .factors
            .iter()
            .find(|f| f.factor == "skills")
            .unwrap();
        assert_eq!(skills.value, 1.0);
        assert!(!skills.defaulted);
    }

    #[tokio::test]
    async fn unknown_kind_is_bad_request() {
        let response = app_with(seeded_repo())
            .oneshot(
                Request::builder()
                    .uri("/api/recommendations?kind=internship")
                    .header("X-User-Id", "student-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_profile_is_served_empty_and_stale() {
        let response = app_with(seeded_repo())
            .oneshot(
                Request::builder()
                    .uri("/api/recommendations")
                    .header("X-User-Id", "nobody")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: RecommendationsResponse = body_json(response).await;
        assert!(body.stale);
        assert!(body.items.is_empty());
    }

    #[tokio::test]
    async fn behavior_is_accepted() {
        let body = r#"{"opportunity_id": "0b1c8c1e-3d43-4c42-9a55-0c2f3b8a6d11", "action": "save"}"#;
        let response = app_with(seeded_repo())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/behavior")
                    .header("X-User-Id", "student-1")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let ack: RecordBehaviorResponse = body_json(response).await;
        assert_eq!(ack.status, "accepted");
    }

    #[tokio::test]
    async fn behavior_with_unknown_action_is_bad_request() {
        let body = r#"{"opportunity_id": "0b1c8c1e-3d43-4c42-9a55-0c2f3b8a6d11", "action": "like"}"#;
        let response = app_with(seeded_repo())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/behavior")
                    .header("X-User-Id", "student-1")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalidate_returns_no_content() {
        let response = app_with(seeded_repo())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/admin/recommendations/invalidate")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"user_id": "student-1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn stats_are_exposed() {
        let response = app_with(seeded_repo())
            .oneshot(
                Request::builder()
                    .uri("/api/admin/recommendations/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let stats: serde_json::Value = body_json(response).await;
        assert_eq!(stats["cache"]["hits"], 0);
    }
}
