pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;

pub use error::HttpError;
pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::AppState;

use axum::{middleware as axum_middleware, routing::get, routing::post, Router};
use std::sync::Arc;

/// Builds the API routes. `/health` is public; everything under
/// `/api/documents` requires an auth session.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/api/documents/templates", get(rest::list_templates_handler))
        .route("/api/documents/generate", post(rest::generate_handler))
        .route("/api/documents/tasks", get(rest::list_tasks_handler))
        .route(
            "/api/documents/tasks/{task_id}",
            get(rest::get_task_handler).delete(rest::delete_task_handler),
        )
        .route("/api/documents/tasks/{task_id}/preview", get(rest::preview_handler))
        .route("/api/documents/tasks/{task_id}/download", get(rest::download_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(rest::health_handler))
        .merge(protected_routes)
        .with_state(app_state)
}
