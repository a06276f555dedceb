//! Endpoints that change repository state.
//!
//! Every handler here goes through the service's mutation serializer, so
//! concurrent requests run their git commands one operation at a time.

use axum::{extract::State, Json};

use crate::branches::validate_branch_name;
use crate::rest::dto::{
    BranchRequest, CleanupResponse, OperationResponse, UpdateAllResponse,
};
use crate::rest::error::ApiError;
use crate::rest::state::ApiState;

/// Branch name from a request body. A missing or unparsable body counts as
/// a missing name.
fn requested_branch(body: Option<Json<BranchRequest>>) -> Result<String, ApiError> {
    let raw = body.and_then(|Json(req)| req.branch).unwrap_or_default();
    Ok(validate_branch_name(&raw)?.to_string())
}

/// Check out a local branch, or create a tracking branch from the remote
#[utoipa::path(
    post,
    path = "/checkout",
    tag = "Operations",
    request_body = BranchRequest,
    responses(
        (status = 200, description = "Branch checked out", body = OperationResponse),
        (status = 400, description = "Missing or invalid branch name", body = OperationResponse),
        (status = 404, description = "Branch not found locally or remotely", body = OperationResponse),
        (status = 500, description = "git checkout failed", body = OperationResponse)
    )
)]
pub async fn checkout(
    State(state): State<ApiState>,
    body: Option<Json<BranchRequest>>,
) -> Result<Json<OperationResponse>, ApiError> {
    let branch = requested_branch(body)?;
    let outcome = state.service.checkout(&branch).await?;
    Ok(Json(outcome.into()))
}

/// Delete a local branch, forcing when it is not fully merged
#[utoipa::path(
    post,
    path = "/delete-branch",
    tag = "Operations",
    request_body = BranchRequest,
    responses(
        (status = 200, description = "Branch deleted", body = OperationResponse),
        (status = 400, description = "Missing name or current branch", body = OperationResponse),
        (status = 404, description = "Branch not found locally", body = OperationResponse),
        (status = 500, description = "git branch failed", body = OperationResponse)
    )
)]
pub async fn delete_branch(
    State(state): State<ApiState>,
    body: Option<Json<BranchRequest>>,
) -> Result<Json<OperationResponse>, ApiError> {
    let branch = requested_branch(body)?;
    let outcome = state.service.delete_branch(&branch).await?;
    Ok(Json(outcome.into()))
}

/// Pull the current branch
#[utoipa::path(
    post,
    path = "/pull",
    tag = "Operations",
    responses(
        (status = 200, description = "Pull finished", body = OperationResponse),
        (status = 500, description = "git pull failed", body = OperationResponse)
    )
)]
pub async fn pull(State(state): State<ApiState>) -> Result<Json<OperationResponse>, ApiError> {
    let outcome = state.service.pull().await?;
    Ok(Json(outcome.into()))
}

/// Pull every local branch that has a remote counterpart
#[utoipa::path(
    post,
    path = "/update-all-branches",
    tag = "Operations",
    responses(
        (status = 200, description = "Per-branch results", body = UpdateAllResponse),
        (status = 500, description = "Could not read branches", body = OperationResponse)
    )
)]
pub async fn update_all(
    State(state): State<ApiState>,
) -> Result<Json<UpdateAllResponse>, ApiError> {
    let report = state.service.update_all().await?;
    Ok(Json(report.into()))
}

/// Delete local branches whose remote counterpart is gone
#[utoipa::path(
    post,
    path = "/cleanup",
    tag = "Operations",
    responses(
        (status = 200, description = "Cleanup summary", body = CleanupResponse),
        (status = 500, description = "Could not read branches", body = OperationResponse)
    )
)]
pub async fn cleanup(State(state): State<ApiState>) -> Result<Json<CleanupResponse>, ApiError> {
    let report = state.service.cleanup().await?;
    Ok(Json(report.into()))
}
