use std::sync::Arc;

use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_derive_error::ErrorResponse;
use common::config::Config;
use derive_more::{Display, Error};
use subtle::ConstantTimeEq;

/// Errors that may occur during internal route authentication.
#[derive(ErrorResponse, Display, Error)]
pub(crate) enum InternalAuthError {
    /// The caller did not present the shared internal secret.
    #[status(StatusCode::UNAUTHORIZED)]
    #[display(fmt = "missing or invalid internal secret")]
    InvalidSecret,
}

/// Internal authentication middleware for [`axum`].
///
/// Internal routes are only reachable with the shared secret in the
/// `x-internal-secret` header. The comparison is constant-time.
pub(crate) async fn require_internal_secret<B>(
    State(config): State<Arc<Config>>,
    req: Request<B>,
    next: Next<B>,
) -> Result<Response, InternalAuthError> {
    let provided = req
        .headers()
        .get("x-internal-secret")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let expected = config.verification.internal_secret.as_bytes();

    if !bool::from(provided.as_bytes().ct_eq(expected)) {
        return Err(InternalAuthError::InvalidSecret);
    }

    Ok(next.run(req).await)
}
