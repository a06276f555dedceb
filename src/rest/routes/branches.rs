//! Branch listing endpoints.

use axum::{
    extract::{Query, State},
    Json,
};

use crate::rest::dto::{
    BranchListResponse, ListQuery, OperationResponse, RemoteBranchListResponse,
    SearchQuery,
};
use crate::rest::error::ApiError;
use crate::rest::state::ApiState;

/// List local branches
#[utoipa::path(
    get,
    path = "/branches",
    tag = "Branches",
    params(ListQuery),
    responses(
        (status = 200, description = "A page of local branches, protected first", body = BranchListResponse),
        (status = 500, description = "git failed", body = OperationResponse)
    )
)]
pub async fn list_local(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<BranchListResponse>, ApiError> {
    let (page, limit) = query.page_and_limit();
    let skip_refresh = query.skip_refresh();

    let branches = state.service.list_local(page, limit, skip_refresh).await?;

    if !skip_refresh {
        state.service.trigger_background_refresh();
    }
    Ok(Json(branches.into()))
}

/// List remote branches
#[utoipa::path(
    get,
    path = "/remote-branches",
    tag = "Branches",
    params(ListQuery),
    responses(
        (status = 200, description = "A page of branches on the remote", body = RemoteBranchListResponse),
        (status = 500, description = "git failed", body = OperationResponse)
    )
)]
pub async fn list_remote(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<RemoteBranchListResponse>, ApiError> {
    let (page, limit) = query.page_and_limit();
    let skip_refresh = query.skip_refresh();

    let branches = state.service.list_remote(page, limit, skip_refresh).await?;

    if !skip_refresh {
        state.service.trigger_background_refresh();
    }
    Ok(Json(branches.into()))
}

/// Search remote branches by name
#[utoipa::path(
    get,
    path = "/remote-branches/search",
    tag = "Branches",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching remote branches", body = RemoteBranchListResponse),
        (status = 500, description = "git failed", body = OperationResponse)
    )
)]
pub async fn search_remote(
    State(state): State<ApiState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<RemoteBranchListResponse>, ApiError> {
    let (page, limit) = query.page_and_limit();
    let q = query.q.as_deref().unwrap_or_default();

    let branches = state.service.search_remote(q, page, limit).await?;
    Ok(Json(branches.into()))
}
