//! OpenAPI specification builder using utoipa.

use utoipa::OpenApi;

use crate::rest::dto::{
    BranchListResponse, BranchRequest, BranchResponse, BranchUpdateResponse, CleanupResponse,
    ConfigResponse, HealthResponse, OperationResponse, PaginationResponse,
    RemoteBranchListResponse, RemoteBranchResponse, StatusResponse, UpdateAllResponse,
};

/// OpenAPI documentation for the branch manager API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Branch Manager API",
        description = "Browse and manage the local branches of one git repository.",
        license(name = "MIT")
    ),
    paths(
        // Health endpoints
        crate::rest::routes::health::health,
        crate::rest::routes::health::config,
        crate::rest::routes::health::status,
        // Branch listings
        crate::rest::routes::branches::list_local,
        crate::rest::routes::branches::list_remote,
        crate::rest::routes::branches::search_remote,
        // Mutations
        crate::rest::routes::operations::checkout,
        crate::rest::routes::operations::delete_branch,
        crate::rest::routes::operations::pull,
        crate::rest::routes::operations::update_all,
        crate::rest::routes::operations::cleanup,
    ),
    components(
        schemas(
            // Response types
            HealthResponse,
            ConfigResponse,
            StatusResponse,
            PaginationResponse,
            BranchResponse,
            BranchListResponse,
            RemoteBranchResponse,
            RemoteBranchListResponse,
            OperationResponse,
            BranchUpdateResponse,
            UpdateAllResponse,
            CleanupResponse,
            // Request types
            BranchRequest,
        )
    ),
    tags(
        (name = "Health", description = "Health, configuration and status endpoints"),
        (name = "Branches", description = "Local and remote branch listings"),
        (name = "Operations", description = "Checkout, delete, pull and cleanup"),
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI specification as a JSON string
    pub fn json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::json().expect("Failed to generate OpenAPI spec");
        assert!(spec.contains("Branch Manager API"));
        assert!(spec.contains("/health"));
        assert!(spec.contains("/remote-branches/search"));
        assert!(spec.contains("/update-all-branches"));
    }

    #[test]
    fn test_openapi_has_all_tags() {
        let spec = ApiDoc::json().expect("Failed to generate OpenAPI spec");
        assert!(spec.contains("\"Health\""));
        assert!(spec.contains("\"Branches\""));
        assert!(spec.contains("\"Operations\""));
    }

    #[test]
    fn test_openapi_query_params_are_camel_case() {
        let spec = ApiDoc::json().expect("Failed to generate OpenAPI spec");
        assert!(spec.contains("skipRefresh"));
    }
}
