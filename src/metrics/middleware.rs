//! Axum middleware that records every request passing through the router.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::Recorder;

/// Times the inner service and records the request once the response is ready.
///
/// Install with `axum::middleware::from_fn_with_state`.
pub async fn track_requests(
    State(recorder): State<Arc<Recorder>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let head = request_head(&request);

    let response = next.run(request).await;
    recorder.record(&head, &response, start);

    response
}

/// Keeps the parts of the request the labels are read from, since the request
/// itself is consumed by the inner service.
fn request_head(request: &Request) -> http::Request<()> {
    let mut head = http::Request::new(());
    *head.method_mut() = request.method().clone();
    *head.uri_mut() = request.uri().clone();
    *head.version_mut() = request.version();
    if let Some(matched) = request.extensions().get::<MatchedPath>() {
        head.extensions_mut().insert(matched.clone());
    }
    head
}
