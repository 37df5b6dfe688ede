//! Request, rate-limit, and auth metrics via the `metrics` crate.
//!
//! ## Metric Naming Conventions
//!
//! All metrics follow the pattern: `medibills_{subsystem}_{name}_{unit}`
//!
//! - Counters: `_total` suffix
//! - Histograms: `_seconds` suffix
//!
//! Without an installed recorder every call is a no-op.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

const HTTP_REQUESTS_TOTAL: &str = "medibills_http_requests_total";
const HTTP_REQUEST_LATENCY: &str = "medibills_http_request_latency_seconds";
const RATE_LIMIT_REJECTED: &str = "medibills_rate_limit_rejected_total";
const AUTH_EVENTS_TOTAL: &str = "medibills_auth_events_total";

/// SLI-aligned histogram bucket boundaries (in seconds).
///
/// - Low-latency: 1ms, 5ms, 10ms, 25ms (cached reads, session lookups)
/// - Medium-latency: 50ms, 100ms, 250ms (writes, multi-table expansions)
/// - High-latency: 500ms, 1s, 5s, 10s (bcrypt, pool contention)
pub const SLI_HISTOGRAM_BUCKETS: [f64; 11] =
    [0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 10.0];

// =============================================================================
// Recorders
// =============================================================================

/// Records one completed HTTP request.
///
/// `medibills_http_requests_total{method, route, status_class}` and
/// `medibills_http_request_latency_seconds{method, route}`.
#[inline]
pub fn record_http_request(method: &str, route: &str, status: u16, latency_secs: f64) {
    counter!(HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status_class" => status_class(status)
    )
    .increment(1);
    histogram!(HTTP_REQUEST_LATENCY, "method" => method.to_string(), "route" => route.to_string())
        .record(latency_secs);
}

/// Records a rate limit rejection.
#[inline]
pub fn record_rate_limit_rejected() {
    counter!(RATE_LIMIT_REJECTED).increment(1);
}

/// Records an auth event such as `login` with its outcome.
///
/// `medibills_auth_events_total{event, outcome}`.
#[inline]
pub fn record_auth_event(event: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(AUTH_EVENTS_TOTAL, "event" => event, "outcome" => outcome).increment(1);
}

fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

/// Middleware timing each request.
///
/// Labels use the matched route template (`/api/medical-bills/:id`), never the
/// raw path, so ids do not explode label cardinality.
pub async fn track_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |path| path.as_str().to_string());

    let response = next.run(req).await;
    record_http_request(&method, &route, response.status().as_u16(), start.elapsed().as_secs_f64());
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_dont_panic_without_recorder() {
        record_http_request("GET", "/api/medical-bills", 200, 0.002);
        record_rate_limit_rejected();
        record_auth_event("login", false);
    }

    #[test]
    fn test_status_class() {
        assert_eq!(status_class(201), "2xx");
        assert_eq!(status_class(404), "4xx");
        assert_eq!(status_class(429), "4xx");
        assert_eq!(status_class(503), "5xx");
    }

    #[test]
    fn test_sli_buckets_are_ascending() {
        for window in SLI_HISTOGRAM_BUCKETS.windows(2) {
            assert!(window[0] < window[1]);
        }
    }
}
