//! HTTP handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use cfsd_refresh::RefreshStatus;

use crate::HttpState;

/// Body of the liveness endpoint.
pub const BANNER: &str = "Cloud Foundry Target Generator for Prometheus Service Discovery";

/// GET /
pub async fn index() -> &'static str {
    BANNER
}

/// GET /status
pub async fn status(State(state): State<HttpState>) -> Json<RefreshStatus> {
    Json(state.status.borrow().clone())
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<HttpState>) -> impl IntoResponse {
    let body = crate::prometheus::render_prometheus(&state.status.borrow());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
