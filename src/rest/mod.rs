//! REST API for the branch manager.
//!
//! Serves the branch listing and mutation endpoints the browser UI uses and,
//! when a static directory is configured, the UI itself.

use axum::{
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;

pub use openapi::ApiDoc;
pub use server::{run, BackgroundTasks};
pub use state::ApiState;

/// Default port for the REST API server
pub const DEFAULT_PORT: u16 = 3001;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the API router with all routes
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = state.config.static_path().filter(|dir| dir.is_dir());

    let router = Router::new()
        // Health endpoints
        .route("/health", get(routes::health::health))
        .route("/config", get(routes::health::config))
        .route("/config.json", get(routes::health::config))
        .route("/status", get(routes::health::status))
        .route("/openapi.json", get(openapi_json))
        // Branch listings
        .route("/branches", get(routes::branches::list_local))
        .route("/remote-branches", get(routes::branches::list_remote))
        .route(
            "/remote-branches/search",
            get(routes::branches::search_remote),
        )
        // Mutations
        .route("/checkout", post(routes::operations::checkout))
        .route("/delete-branch", post(routes::operations::delete_branch))
        .route("/pull", post(routes::operations::pull))
        .route(
            "/update-all-branches",
            post(routes::operations::update_all),
        )
        .route("/cleanup", post(routes::operations::cleanup));

    let router = match static_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "Serving static UI");
            let index = ServeFile::new(dir.join("index.html"));
            router.fallback_service(ServeDir::new(dir).fallback(index))
        }
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
