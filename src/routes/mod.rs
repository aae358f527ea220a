// Local panel feed: HTTP + WebSocket routes

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::scheduler::MonitorHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) monitor: MonitorHandle,
}

pub fn app(monitor: MonitorHandle) -> Router {
    let state = AppState { monitor };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/sample", get(http::sample_handler)) // GET /api/sample
        .route("/api/processes", get(http::processes_handler)) // GET /api/processes
        .route("/api/processes/{index}/kill", post(http::kill_handler)) // POST /api/processes/{index}/kill
        .route("/ws/panel", get(ws::ws_panel)) // WS /ws/panel
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
