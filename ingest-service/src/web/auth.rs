//! API-key guard for the instrumentation routes.
//!
//! A pure gate over the `X-API-Key` header and the static key set loaded
//! at startup. Rejected requests never reach the wrapped handler.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::config::Config;
use crate::error::AppError;

/// Header carrying the shared secret on protected routes.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Reject requests whose `X-API-Key` header is missing or not in the
/// configured key set. Plain set membership; keys are opaque secrets
/// distributed out of band.
pub async fn require_api_key(
    State(config): State<Arc<Config>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match key {
        None => {
            warn!("api_key_missing");
            Err(AppError::Unauthorized)
        }
        Some(key) if !config.api_keys.contains(key) => {
            warn!("api_key_invalid");
            Err(AppError::Unauthorized)
        }
        Some(_) => Ok(next.run(request).await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::post,
        Router,
    };
    use tower::util::ServiceExt;

    fn test_config(keys: &[&str]) -> Arc<Config> {
        Arc::new(Config {
            database_url: String::new(),
            database_max_connections: 1,
            api_keys: keys.iter().map(|k| k.to_string()).collect(),
            slack_signing_secret: None,
            slack_bot_token: None,
            slack_log_webhook_url: None,
            slack_signature_max_age: 300,
            port: 0,
        })
    }

    /// Handler standing in for the storage path; reaching it fails the
    /// test.
    async fn must_not_run() -> StatusCode {
        panic!("handler must not run")
    }

    fn guarded_router(config: Arc<Config>) -> Router {
        Router::new()
            .route("/protected", post(must_not_run))
            .route_layer(middleware::from_fn_with_state(config, require_api_key))
    }

    fn request(key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/protected");
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_key_is_rejected_before_handler() {
        let app = guarded_router(test_config(&["secret"]));
        let response = app.oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_key_is_rejected_before_handler() {
        let app = guarded_router(test_config(&["secret"]));
        let response = app.oneshot(request(Some("not-the-secret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_key_reaches_handler() {
        let config = test_config(&["secret"]);
        let app = Router::new()
            .route("/protected", post(|| async { StatusCode::ACCEPTED }))
            .route_layer(middleware::from_fn_with_state(config, require_api_key));

        let response = app.oneshot(request(Some("secret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
