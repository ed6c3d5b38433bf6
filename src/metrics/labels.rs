//! Label extraction for request metrics.
//!
//! Both the request counter and the timing histogram are labeled with the same
//! fixed set of names. Keeping the values in a struct rather than a map means the
//! two measures cannot drift apart.

use std::time::Instant;

use axum::extract::MatchedPath;
use http::{Method, Request, Response, StatusCode};

/// Label names shared by every request metric, in registration order.
pub const LABEL_NAMES: [&str; 3] = ["method", "route", "status"];

/// Placeholder for attributes that could not be read off the request.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Label values for a single completed request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestLabels {
    pub method: String,
    pub route: String,
    pub status: String,
}

impl RequestLabels {
    /// Builds labels from already extracted parts, substituting
    /// [`UNKNOWN_LABEL`] for anything missing or empty.
    pub fn from_parts(method: Option<&Method>, route: Option<&str>, status: StatusCode) -> Self {
        RequestLabels {
            method: non_empty_or_unknown(method.map(Method::as_str)),
            route: non_empty_or_unknown(route),
            status: status.as_u16().to_string(),
        }
    }

    /// Values in the same order as [`LABEL_NAMES`].
    pub fn values(&self) -> [&str; 3] {
        [&self.method, &self.route, &self.status]
    }
}

fn non_empty_or_unknown(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => UNKNOWN_LABEL.to_string(),
    }
}

/// Reads the method, matched route pattern and status code off a
/// request/response pair.
///
/// The route is the pattern axum matched (`/users/:id`), never the raw path, so
/// requests that did not match any route are labeled `unknown`.
pub fn extract_default_labels<B, R>(request: &Request<B>, response: &Response<R>) -> RequestLabels {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str);

    RequestLabels::from_parts(Some(request.method()), route, response.status())
}

/// Seconds elapsed since `start` on the monotonic clock.
pub fn extract_timing_seconds(start: Instant) -> f64 {
    // Instant::elapsed saturates at zero, so this never goes negative.
    start.elapsed().as_secs_f64()
}
