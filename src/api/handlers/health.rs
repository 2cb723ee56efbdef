use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::response::JSend;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub storage: bool,
    pub test_mode: bool,
}

/// Liveness plus a quick check of the database and the primary storage root.
pub async fn health(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<JSend<HealthResponse>>) {
    let database = match state.db.begin_read() {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(error = %e, "Health check could not open a read transaction");
            false
        }
    };
    let storage = tokio::fs::try_exists(&state.config.storage.root)
        .await
        .unwrap_or(false);
    if !storage {
        tracing::warn!(root = %state.config.storage.root, "Health check found no storage root");
    }

    let healthy = database && storage;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        JSend::success(HealthResponse {
            status: if healthy { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            database,
            storage,
            test_mode: state.config.test_mode,
        }),
    )
}
