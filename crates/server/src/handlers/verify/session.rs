use axum::{extract::State, Json};
use axum_derive_error::ErrorResponse;
use db::{
    guild, sea_query::OnConflict, verify_session, DbErr, Duration, EntityTrait,
    TransactionErrorExt, TransactionTrait,
};
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};

use crate::{token, AppState};

use super::rfc3339;

/// Errors that may occur during session creation.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum CreateSessionError {
    /// Database-related error.
    DatabaseError(DbErr),
}

/// Session creation request.
#[derive(Deserialize)]
pub(super) struct CreateSessionRequest {
    guild_id: i64,
    discord_user_id: i64,
}

/// Session creation response.
///
/// `link` is the deep link a member opens to sign the challenge;
/// `token` is the same credential for clients that build their own UI.
#[derive(Serialize)]
pub(super) struct CreateSessionResponse {
    token: String,
    link: String,
    expires_at: String,
}

/// Create a new verification session for a guild member.
///
/// The guild row is created on first interaction. The returned token is
/// HMAC-signed and bound to the stored session.
pub(super) async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, CreateSessionError> {
    let ttl = Duration::minutes(state.config.verification.session_ttl_minutes as i64);

    let session = state
        .db
        .transaction(|txn| {
            Box::pin(async move {
                guild::Entity::insert(guild::on_first_interaction(request.guild_id))
                    .on_conflict(OnConflict::column(guild::Column::Id).do_nothing().to_owned())
                    .exec_without_returning(txn)
                    .await?;

                verify_session::Entity::insert(verify_session::generate(
                    request.guild_id,
                    request.discord_user_id,
                    ttl,
                ))
                .exec_with_returning(txn)
                .await
            })
        })
        .await
        .into_raw_result()?;

    let claims = token::TokenClaims {
        guild_id: session.guild_id,
        member_id: session.member_id,
        session_id: session.id,
        exp: session.expires_at.assume_utc().unix_timestamp(),
    };

    let token = token::sign(&claims, &state.config.verification.hmac_secret);

    let link = format!(
        "{}/verify?token={token}",
        state.config.verification.public_base_url.trim_end_matches('/'),
    );

    Ok(Json(CreateSessionResponse {
        token,
        link,
        expires_at: rfc3339(session.expires_at),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::testing::{create_database, RequestBodyExt, ResponseBodyExt};

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use common::config::Config;
    use db::{verify_session, EntityTrait};
    use serde_json::json;
    use tower::ServiceExt;
    use worker::JobQueue;

    #[tokio::test]
    async fn requires_internal_secret() {
        let db = create_database().await;
        let (queue, _jobs) = JobQueue::detached();

        let response = crate::app_router(Arc::new(db), Arc::new(Config::for_tests()), queue)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/verify/session")
                    .header("Content-Type", "application/json")
                    .body(Body::from_json(json!({
                        "guild_id": 1,
                        "discord_user_id": 2
                    })))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn creates_session_and_deep_link() {
        let db = create_database().await;
        let (queue, _jobs) = JobQueue::detached();
        let config = Config::for_tests();
        let secret = config.verification.internal_secret.clone();

        let response = crate::app_router(Arc::new(db.clone()), Arc::new(config), queue)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/verify/session")
                    .header("Content-Type", "application/json")
                    .header("x-internal-secret", secret)
                    .body(Body::from_json(json!({
                        "guild_id": 1,
                        "discord_user_id": 2
                    })))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.json().await;

        let token = body["token"].as_str().unwrap();
        let link = body["link"].as_str().unwrap();

        assert!(link.contains("/verify?token="));
        assert!(link.ends_with(token));

        let sessions = verify_session::Entity::find().all(&db).await.unwrap();

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].guild_id, 1);
        assert_eq!(sessions[0].member_id, 2);
        assert_eq!(sessions[0].nonce.len(), 32);
        assert!(sessions[0]
            .challenge_message
            .starts_with("Verify Discord 2 in Guild 1 nonce "));
    }
}
