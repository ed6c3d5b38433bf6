//! HTTP route definitions and handlers.

mod health_routes;
mod metrics_routes;

use crate::metrics::track_requests;
use crate::state::AppState;
use axum::{middleware, Router};

/// Creates the application router with all configured routes.
///
/// Every route, including the fallback, is wrapped by the request tracking
/// middleware so it shows up in the recorder.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(metrics_routes::routes(&state.config.metrics.path))
        .merge(health_routes::routes())
        .layer(middleware::from_fn_with_state(
            state.recorder.clone(),
            track_requests,
        ))
        .with_state(state)
}
