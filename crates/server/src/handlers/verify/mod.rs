/// Challenge retrieval route.
mod challenge;

/// Static signing page route.
mod page;

/// Session creation route (internal).
mod session;

/// Signature submission route.
mod submit;

use axum::{
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use axum_derive_error::ErrorResponse;
use db::{verify_session, DbErr, EntityTrait, PrimitiveDateTime};
use derive_more::{Display, Error, From};
use time::format_description::well_known::Rfc3339;

use crate::{auth, token, AppState};

/// Create a router that provides an API server with wallet verification routes.
///
/// Session creation is reserved for internal callers; the remaining
/// routes are reached by members following their verify deep link.
pub(crate) fn routes(state: AppState) -> Router {
    let internal = Router::new()
        .route("/session", post(session::create))
        .route_layer(from_fn_with_state(
            state.config.clone(),
            auth::require_internal_secret,
        ))
        .with_state(state.clone());

    Router::new()
        .route("/", get(page::page))
        .route("/challenge", get(challenge::challenge))
        .route("/submit", post(submit::submit))
        .with_state(state)
        .merge(internal)
}

/// Errors that may occur during the verification protocol.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum VerifyError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// The verify token is malformed, expired or carries a bad tag.
    #[status(StatusCode::BAD_REQUEST)]
    #[display(fmt = "invalid token")]
    InvalidToken,

    /// The session is missing, expired, consumed or does not match
    /// the token's identity.
    #[status(StatusCode::BAD_REQUEST)]
    #[display(fmt = "session invalid")]
    SessionInvalid,

    /// Cryptographic signature verification failed.
    #[status(StatusCode::BAD_REQUEST)]
    #[display(fmt = "invalid signature")]
    InvalidSignature,
}

/// Verify a token and load its usable session.
///
/// Both checks are required: the token proves the deep link was issued
/// by this service, the session row enforces single use and expiry.
pub(super) async fn load_session(
    state: &AppState,
    token: &str,
) -> Result<verify_session::Model, VerifyError> {
    let now = db::now();

    let claims = token::verify(
        token,
        &state.config.verification.hmac_secret,
        now.assume_utc().unix_timestamp(),
    )
    .map_err(|_| VerifyError::InvalidToken)?;

    let session = verify_session::Entity::find_by_id(claims.session_id)
        .one(state.db.as_ref())
        .await?
        .ok_or(VerifyError::SessionInvalid)?;

    if session.guild_id != claims.guild_id || session.member_id != claims.member_id {
        return Err(VerifyError::SessionInvalid);
    }

    if session.is_used() || session.is_expired(now) {
        return Err(VerifyError::SessionInvalid);
    }

    Ok(session)
}

/// RFC 3339 rendering for response timestamps.
pub(super) fn rfc3339(timestamp: PrimitiveDateTime) -> String {
    timestamp
        .assume_utc()
        .format(&Rfc3339)
        .expect("well-formed timestamp")
}
