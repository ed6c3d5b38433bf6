//! Errors raised while setting up request metrics.

use thiserror::Error;

/// Errors surfaced when constructing a [`Recorder`](crate::metrics::Recorder).
///
/// These are construction-time failures only. Recording and rendering never
/// return an error.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The registry refused a metric, either because the name is already taken
    /// or because it is not a valid Prometheus metric name.
    #[error("failed to register metric '{name}': {source}")]
    Registration {
        name: String,
        #[source]
        source: prometheus::Error,
    },

    #[error("invalid recorder options: {0}")]
    Config(String),
}
