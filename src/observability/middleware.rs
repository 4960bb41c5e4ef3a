// ============================================================================
// HTTP METRICS MIDDLEWARE
// ============================================================================

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::observability::record_http_request;

/// Label for requests that hit no route, so 404 probes share one series.
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Records count and latency of every request
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let endpoint = endpoint_label(req.extensions().get::<MatchedPath>());

    let response = next.run(req).await;

    record_http_request(
        &method,
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

/// Route template (`/api/v1/todo/:id`), never the raw path.
pub fn endpoint_label(matched: Option<&MatchedPath>) -> String {
    matched
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string())
}
