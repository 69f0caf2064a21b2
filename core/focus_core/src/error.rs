use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::store::StoreError;

#[derive(Serialize)]
struct ErrResponse {
    ok: bool,
    error: &'static str,
    message: &'static str,
}

/// Failures surfaced to HTTP callers. Details stay in the server log.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid session payload")]
    InvalidSession,
    #[error("invalid settings payload")]
    InvalidSettings,
    #[error("date range parameters missing")]
    MissingDateRange,
    #[error("date range parameters unparseable")]
    InvalidDateRange,
    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },
}

impl ApiError {
    pub fn store(context: &'static str, source: StoreError) -> Self {
        ApiError::Store { context, source }
    }

    fn parts(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            ApiError::InvalidSession => {
                (StatusCode::BAD_REQUEST, "invalid_session", "Invalid session data")
            }
            ApiError::InvalidSettings => {
                (StatusCode::BAD_REQUEST, "invalid_settings", "Invalid settings data")
            }
            ApiError::MissingDateRange => (
                StatusCode::BAD_REQUEST,
                "missing_date_range",
                "Start date and end date are required",
            ),
            ApiError::InvalidDateRange => (
                StatusCode::BAD_REQUEST,
                "invalid_date_range",
                "Start date and end date must be RFC 3339 timestamps or YYYY-MM-DD dates",
            ),
            ApiError::Store { context, .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "store_error", *context)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = self.parts();
        (
            status,
            Json(ErrResponse {
                ok: false,
                error,
                message,
            }),
        )
            .into_response()
    }
}
