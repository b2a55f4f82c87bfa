//! Service error taxonomy.
//!
//! Every failure a handler can produce maps onto one of four categories:
//! client input errors (400), authentication failures (401), duplicate
//! registration conflicts (409), and storage failures (500). Storage
//! errors are logged server-side and never leak detail to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed JSON, missing required fields, or an unknown event name.
    #[error("{0}")]
    InvalidPayload(String),

    /// Missing or invalid API key, or a failed signature check.
    #[error("unauthorized")]
    Unauthorized,

    /// A second attempt to register an identity that already holds a
    /// registration decision.
    #[error("user already registered")]
    AlreadyRegistered,

    /// Storage layer failure.
    #[error("storage error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::AlreadyRegistered => StatusCode::CONFLICT,
            AppError::Database(e) => {
                error!(error = %e, "storage_error");
                return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
            }
        };

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let resp = AppError::InvalidPayload("bad".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = AppError::Unauthorized.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = AppError::AlreadyRegistered.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = AppError::Database(sqlx::Error::PoolClosed).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
