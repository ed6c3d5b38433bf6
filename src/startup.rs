//! Application startup and server initialization.

use std::sync::Arc;

use prometheus::Registry;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ConfigV1;
use crate::error::RecorderError;
use crate::metrics::{Recorder, RecorderOptions};
use crate::routes;
use crate::state::AppState;

/// Builds the recorder and shared state from configuration.
///
/// # Errors
///
/// Returns the recorder's registration error if the configured metric names
/// are invalid, or a config error if the metrics path is not absolute.
pub fn build_state(
    config: Arc<ConfigV1>,
    registry: Arc<Registry>,
) -> Result<AppState, RecorderError> {
    if !config.metrics.path.starts_with('/') {
        return Err(RecorderError::Config(format!(
            "metrics.path must start with '/', got '{}'",
            config.metrics.path
        )));
    }

    let recorder = Recorder::new(registry, &RecorderOptions::from(&config.metrics))?;

    Ok(AppState {
        config,
        recorder: Arc::new(recorder),
    })
}

/// Initializes and runs the application server.
///
/// # Errors
///
/// Returns an error if the recorder cannot be constructed, if the server fails
/// to bind to the configured address, or if serving fails.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(config.clone(), Arc::new(Registry::new()))?;
    info!(
        counter = state.recorder.counter_name(),
        histogram = state.recorder.histogram_name(),
        path = %config.metrics.path,
        "Request metrics ready"
    );

    let app = routes::create_router(state);

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Starting server on {}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
