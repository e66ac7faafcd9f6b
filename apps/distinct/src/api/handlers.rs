//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{DispatchRequest, DispatchResponse, HealthResponse},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use distinct_core::DistinctError;

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// DISPATCH HANDLER
// =============================================================================

/// Queue one agent report for its session.
///
/// Answers once the report is queued, not once it is processed.
pub async fn dispatch_handler(
    State(state): State<AppState>,
    Path(session): Path<String>,
    Json(request): Json<DispatchRequest>,
) -> impl IntoResponse {
    match state.sessions.submit(&session, &request.report).await {
        Ok(discriminator) => {
            tracing::debug!(
                session = %session,
                discriminator = %discriminator,
                "report queued"
            );
            (StatusCode::OK, Json(DispatchResponse::success()))
        }
        Err(e @ DistinctError::SessionFailed(_)) => {
            tracing::warn!(session = %session, "rejecting report: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(DispatchResponse::error(e.to_string())),
            )
        }
        Err(e) => {
            tracing::warn!(session = %session, "malformed report: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(DispatchResponse::error(e.to_string())),
            )
        }
    }
}
