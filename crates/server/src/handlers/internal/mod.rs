/// On-demand recheck route.
mod recheck;

/// Wallet unlink route.
mod unlink;

use axum::{middleware::from_fn_with_state, routing::post, Router};

use crate::{auth, AppState};

/// Create a router that provides an API server with internal worker
/// control routes. Every route requires the shared internal secret.
pub(crate) fn routes(state: AppState) -> Router {
    Router::new()
        .route("/recheck", post(recheck::recheck))
        .route("/unlink", post(unlink::unlink))
        .route_layer(from_fn_with_state(
            state.config.clone(),
            auth::require_internal_secret,
        ))
        .with_state(state)
}
