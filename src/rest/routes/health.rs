//! Health, configuration and working tree status endpoints.

use axum::{extract::State, Json};

use crate::git::SerializerState;
use crate::rest::dto::{ConfigResponse, HealthResponse, OperationResponse, StatusResponse};
use crate::rest::error::ApiError;
use crate::rest::state::ApiState;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        busy: state.service.serializer_state() == SerializerState::Busy,
        queued_mutations: state.service.queued_mutations(),
    })
}

/// Public UI configuration
#[utoipa::path(
    get,
    path = "/config",
    tag = "Health",
    responses(
        (status = 200, description = "Settings the browser UI needs", body = ConfigResponse)
    )
)]
pub async fn config(State(state): State<ApiState>) -> Json<ConfigResponse> {
    Json(state.config.public().into())
}

/// Porcelain status of the working tree
#[utoipa::path(
    get,
    path = "/status",
    tag = "Health",
    responses(
        (status = 200, description = "git status --porcelain output", body = StatusResponse),
        (status = 500, description = "git status failed", body = OperationResponse)
    )
)]
pub async fn status(State(state): State<ApiState>) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.service.status().await?;
    Ok(Json(StatusResponse {
        success: true,
        status,
    }))
}
