//! Metrics exposition endpoint.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Creates the metrics route at `path`.
pub fn routes(path: &str) -> Router<AppState> {
    Router::new().route(path, get(metrics_handler))
}

/// Returns all collected metrics in Prometheus text format.
///
/// Restrict this path at the ingress if the service is publicly exposed.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let metrics_text = state.recorder.get_metrics();

    (
        StatusCode::OK,
        [("Content-Type", EXPOSITION_CONTENT_TYPE)],
        metrics_text,
    )
}
