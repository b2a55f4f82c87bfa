//! HTTP surface: router, handlers, and the API-key guard.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub use auth::require_api_key;
pub use handlers::{
    health, ingest_event, ingest_user, slack_events, AppState, EventPayload, HealthResponse,
    UserPayload,
};

/// Build the full application router.
///
/// Only the two instrumentation routes sit behind the API-key guard; the
/// Slack route authenticates with signature headers and health is open.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/instrumentation/user", post(ingest_user))
        .route("/instrumentation/event", post(ingest_event))
        .route_layer(middleware::from_fn_with_state(
            state.config.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/slack/events", post(slack_events))
        .merge(protected)
        .with_state(state)
}
