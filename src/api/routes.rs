use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let request_limit = state.config.max_request_size as usize;

    let api = Router::new()
        // Documents
        .route(
            "/documentpaths",
            get(handlers::list_documents).post(handlers::create_document),
        )
        .route(
            "/documentpaths/:id",
            get(handlers::get_document)
                .put(handlers::update_document)
                .delete(handlers::delete_document),
        )
        .route(
            "/documentpaths/:id/download",
            get(handlers::download_document),
        )
        // History entries
        .route(
            "/historiques",
            get(handlers::list_historiques).post(handlers::create_historique),
        )
        .route(
            "/historiques/:id",
            get(handlers::get_historique)
                .put(handlers::update_historique)
                .delete(handlers::delete_historique),
        )
        .route(
            "/historiques/:id/download",
            get(handlers::download_historique),
        )
        // Tasks
        .route("/tasks", get(handlers::list_tasks).post(handlers::create_task))
        .route(
            "/tasks/:id",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
        // Divisions
        .route(
            "/divisions",
            get(handlers::list_divisions).post(handlers::create_division),
        )
        .route(
            "/divisions/:id",
            get(handlers::get_division)
                .put(handlers::update_division)
                .delete(handlers::delete_division),
        )
        // Admins
        .route("/admins", get(handlers::list_admins).post(handlers::create_admin))
        .route(
            "/admins/:id",
            get(handlers::get_admin)
                .put(handlers::update_admin)
                .delete(handlers::delete_admin),
        )
        // Superadmins
        .route(
            "/superadmins",
            get(handlers::list_superadmins).post(handlers::create_superadmin),
        )
        .route(
            "/superadmins/:id",
            get(handlers::get_superadmin)
                .put(handlers::update_superadmin)
                .delete(handlers::delete_superadmin),
        );

    if state.config.test_mode {
        tracing::warn!("Test mode enabled; record downloads are returned inline.");
    }

    Router::new()
        .nest("/api/v1", api)
        // Stored files by relative path
        .route("/download/*path", get(handlers::serve_download))
        // Internal
        .route("/_internal/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(request_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
