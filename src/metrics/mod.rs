//! Request metrics collection and exposition for Prometheus.
//!
//! A [`Recorder`] owns a request counter and a timing histogram, both labeled by
//! [`RequestLabels`]. The [`track_requests`] middleware feeds it from axum.

mod labels;
mod middleware;
mod recorder;

pub use labels::{
    extract_default_labels, extract_timing_seconds, RequestLabels, LABEL_NAMES, UNKNOWN_LABEL,
};
pub use middleware::track_requests;
pub use recorder::{Recorder, RecorderOptions};
