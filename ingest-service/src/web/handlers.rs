//! HTTP endpoint handlers.
//!
//! The instrumentation handlers decode the raw body themselves so that
//! every malformed payload maps to a plain 400 with a message naming the
//! violated constraint. The Slack handler verifies the request signature
//! against the raw bytes before any JSON is parsed as trusted data.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::notify::StatusRelay;
use crate::slack::{verify_slack_signature, InnerEvent, SignatureError, SlackEnvelope};
use crate::store::{self, AllowedEvents, EventRecord, UserRegistration};

/// Header carrying the Slack request timestamp.
const SLACK_TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";

/// Header carrying the Slack request signature.
const SLACK_SIGNATURE_HEADER: &str = "X-Slack-Signature";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: sqlx::PgPool,
    pub allowed_events: Arc<AllowedEvents>,
    pub status_relay: Arc<StatusRelay>,
}

impl AppState {
    pub fn new(
        config: Config,
        pool: sqlx::PgPool,
        allowed_events: AllowedEvents,
        status_relay: StatusRelay,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pool,
            allowed_events: Arc::new(allowed_events),
            status_relay: Arc::new(status_relay),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint. 200 only when storage answers a ping.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    store::ping(&state.pool).await?;
    Ok(Json(HealthResponse { status: "ok" }))
}

// =============================================================================
// Instrumentation: user registration
// =============================================================================

/// `POST /instrumentation/user` request body.
#[derive(Debug, Deserialize)]
pub struct UserPayload {
    pub slack_id: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub join_origin: Option<String>,
    #[serde(default)]
    pub is_restricted: bool,
}

/// Register a user, or transition their join origin exactly once.
pub async fn ingest_user(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let payload: UserPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidPayload(format!("invalid JSON: {e}")))?;

    let slack_id = payload.slack_id.clone();

    store::register_user(
        &state.pool,
        UserRegistration {
            slack_id: payload.slack_id,
            join_date: payload.timestamp,
            timezone: payload.timezone,
            join_origin: payload.join_origin,
            is_restricted: payload.is_restricted,
        },
    )
    .await?;

    state
        .status_relay
        .send(&format!("registered user {slack_id}"))
        .await;

    Ok(StatusCode::ACCEPTED)
}

// =============================================================================
// Instrumentation: event recording
// =============================================================================

/// `POST /instrumentation/event` request body.
#[derive(Debug, Deserialize)]
pub struct EventPayload {
    pub slack_id: String,
    pub event_name: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Append one instrumentation event to its destination table.
pub async fn ingest_event(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let payload: EventPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidPayload(format!("invalid JSON: {e}")))?;

    store::record_event(
        &state.pool,
        &state.allowed_events,
        EventRecord {
            slack_id: payload.slack_id,
            event_name: payload.event_name,
            timestamp: payload.timestamp,
            metadata: payload.metadata,
        },
    )
    .await?;

    Ok(StatusCode::ACCEPTED)
}

// =============================================================================
// Slack Events API
// =============================================================================

/// `POST /slack/events` endpoint.
///
/// Verification order is fixed: signature first, JSON second. The
/// challenge handshake is still signed, so it gets no exemption from
/// verification, only from downstream processing.
pub async fn slack_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signing_secret) = state.config.slack_signing_secret.as_deref() else {
        warn!("slack_signing_secret_not_configured");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let timestamp = headers
        .get(SLACK_TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok());
    let signature = headers
        .get(SLACK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        warn!("slack_signature_headers_missing");
        return StatusCode::BAD_REQUEST.into_response();
    };

    match verify_slack_signature(
        signing_secret,
        timestamp,
        signature,
        &body,
        state.config.slack_signature_max_age,
    ) {
        Ok(()) => {}
        Err(SignatureError::MalformedHeaders) => {
            return StatusCode::BAD_REQUEST.into_response();
        }
        Err(reason) => {
            warn!(reason = ?reason, "slack_request_rejected");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let envelope: SlackEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            error!(error = %e, "slack_envelope_decode_failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match envelope {
        SlackEnvelope::UrlVerification { challenge } => {
            info!("slack_url_verification");
            ([(header::CONTENT_TYPE, "text")], challenge).into_response()
        }
        SlackEnvelope::EventCallback { event } => {
            handle_callback(&state, event).await;
            StatusCode::OK.into_response()
        }
        SlackEnvelope::Unknown => {
            debug!("slack_envelope_ignored");
            StatusCode::OK.into_response()
        }
    }
}

/// Process a verified callback event.
///
/// Runs within the same request; failures are logged and never change
/// the 200 already owed to Slack.
async fn handle_callback(state: &AppState, event: InnerEvent) {
    match event {
        InnerEvent::UserChange { user } => {
            if user.is_restricted {
                // Still restricted; there is nothing to lift.
                return;
            }

            match store::lift_restriction(&state.pool, &user.id, &user.tz, user.is_restricted)
                .await
            {
                Ok(true) => info!(slack_id = %user.id, "user_restriction_lifted"),
                Ok(false) => debug!(slack_id = %user.id, "user_restriction_already_clear"),
                Err(e) => error!(error = %e, slack_id = %user.id, "user_change_update_failed"),
            }
        }
        InnerEvent::Unknown => {
            debug!("slack_inner_event_ignored");
        }
    }
}
