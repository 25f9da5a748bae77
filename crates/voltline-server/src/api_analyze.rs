//! Turn-analysis endpoint.

use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use thiserror::Error;
use voltline_types::{AnalysisOutcome, AnalyzeRequest};

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Handler for `POST /api/analyze`.
///
/// Direct pass-through to the language model: the turn text goes up, the
/// structured verdict comes back. Upstream failures surface as a 500 with a
/// generic error body; the conversation controller recovers from those by
/// apologizing to the caller.
pub async fn analyze_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisOutcome>, ApiError> {
    let outcome = state
        .chat
        .analyze_conversation(&request.text)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "conversation analysis failed");
            ApiError::InternalServerError("Failed to analyze conversation".to_string())
        })?;

    tracing::debug!(
        should_continue = outcome.should_continue,
        has_address = outcome.address.is_some(),
        "analysis verdict"
    );

    Ok(Json(outcome))
}
