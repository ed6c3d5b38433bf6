//! Shared application state.

use crate::config::ConfigV1;
use crate::metrics::Recorder;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Request metrics recorder, also used by the tracking middleware.
    pub recorder: Arc<Recorder>,
}
