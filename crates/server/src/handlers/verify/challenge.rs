use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;

use super::{load_session, rfc3339, VerifyError};

/// Query string carrying the verify token.
#[derive(Deserialize)]
pub(super) struct ChallengeQuery {
    token: String,
}

/// Challenge retrieval response.
#[derive(Serialize)]
pub(super) struct ChallengeResponse {
    challenge_message: String,
    expires_at: String,
}

/// Return the exact message a member must sign.
///
/// The message is server-chosen; clients sign these bytes verbatim and
/// cannot substitute their own content.
pub(super) async fn challenge(
    State(state): State<AppState>,
    Query(query): Query<ChallengeQuery>,
) -> Result<Json<ChallengeResponse>, VerifyError> {
    let session = load_session(&state, &query.token).await?;

    Ok(Json(ChallengeResponse {
        challenge_message: session.challenge_message,
        expires_at: rfc3339(session.expires_at),
    }))
}
