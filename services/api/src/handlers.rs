//! Axum Handlers for the REST API
//!
//! Service health and read access to logged conversations. `utoipa` doc
//! comments generate the OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::error;
use voxrelay_core::store::limit_param;

use crate::{
    models::{ErrorResponse, HealthChecks, HealthResponse, HistoryItem, HistoryResponse},
    state::AppState,
};

/// Longest session id the `conversations` table can hold.
pub const MAX_SESSION_ID_LEN: usize = 255;

pub enum ApiError {
    BadRequest(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

pub fn validate_session_id(session_id: &str) -> Result<(), ApiError> {
    if session_id.trim().is_empty() {
        return Err(ApiError::BadRequest("session id must not be empty".to_string()));
    }
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(ApiError::BadRequest(format!(
            "session id must be at most {} bytes",
            MAX_SESSION_ID_LEN
        )));
    }
    Ok(())
}

/// Report service health, including database connectivity.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "All checks passed", body = HealthResponse),
        (status = 503, description = "At least one check failed", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let database_connected = state.store.health_check().await;
    let (code, status) = if database_connected {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "partial_error")
    };
    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            timestamp: Utc::now(),
            checks: HealthChecks { database_connected },
        }),
    )
}

/// Get the most recent logged turns of a session, oldest first.
#[utoipa::path(
    get,
    path = "/api/history/{session_id}",
    responses(
        (status = 200, description = "Conversation history", body = HistoryResponse),
        (status = 400, description = "Invalid session id", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("session_id" = String, Path, description = "Session ID")
    )
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    validate_session_id(&session_id)?;
    let turns = state
        .store
        .recent(&session_id, limit_param(state.settings.history_limit))
        .await?;
    Ok(Json(HistoryResponse {
        session_id,
        history: turns.into_iter().map(HistoryItem::from).collect(),
    }))
}
