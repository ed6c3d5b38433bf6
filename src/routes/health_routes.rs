//! Liveness probe.

use crate::state::AppState;
use axum::{http::StatusCode, routing::get, Router};

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(|| async { (StatusCode::OK, "OK") }))
}
