use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use worker::Job;

use crate::AppState;

/// Recheck request. Without `discord_user_id` the whole guild
/// is rechecked.
#[derive(Deserialize)]
pub(super) struct RecheckRequest {
    guild_id: i64,
    #[serde(default)]
    discord_user_id: Option<i64>,
}

/// Queue an on-demand recheck.
///
/// Enqueueing is fire-and-forget; the single queue consumer picks the
/// job up in submission order.
pub(super) async fn recheck(
    State(state): State<AppState>,
    Json(request): Json<RecheckRequest>,
) -> Json<Value> {
    state.queue.enqueue(Job::Recheck {
        guild_id: request.guild_id,
        member_id: request.discord_user_id,
    });

    Json(json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::testing::{create_database, RequestBodyExt, ResponseBodyExt};

    use assert_json::assert_json;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use common::config::Config;
    use serde_json::json;
    use tower::ServiceExt;
    use worker::{Job, JobQueue};

    #[tokio::test]
    async fn enqueues_guild_recheck() {
        let db = create_database().await;
        let (queue, mut jobs) = JobQueue::detached();
        let config = Config::for_tests();
        let secret = config.verification.internal_secret.clone();

        let response = crate::app_router(Arc::new(db), Arc::new(config), queue)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/internal/recheck")
                    .header("Content-Type", "application/json")
                    .header("x-internal-secret", secret)
                    .body(Body::from_json(json!({ "guild_id": 1 })))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_json!(response.json().await, { "ok": true });
        assert_eq!(
            jobs.try_recv().unwrap(),
            Job::Recheck {
                guild_id: 1,
                member_id: None
            }
        );
    }

    #[tokio::test]
    async fn requires_internal_secret() {
        let db = create_database().await;
        let (queue, _jobs) = JobQueue::detached();

        let response = crate::app_router(Arc::new(db), Arc::new(Config::for_tests()), queue)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/internal/recheck")
                    .header("Content-Type", "application/json")
                    .header("x-internal-secret", "wrong")
                    .body(Body::from_json(json!({ "guild_id": 1 })))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
