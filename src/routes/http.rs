// GET handlers: version, latest sample, process list; POST kill

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::AppState;

/// GET /version: service name and version from Cargo.toml at build time.
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/sample: latest sample, 204 until the first tick completes.
pub(super) async fn sample_handler(State(state): State<AppState>) -> Response {
    match state.monitor.latest() {
        Some(sample) => Json(sample.as_ref().clone()).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// GET /api/processes: the list kill indices refer to.
pub(super) async fn processes_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.current_processes())
}

/// POST /api/processes/{index}/kill
pub(super) async fn kill_handler(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Response {
    match state.monitor.kill_process_group(index).await {
        Ok(Some(report)) => Json(report).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no process group at index {}", index) })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, operation = "kill_process_group", "kill request failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
