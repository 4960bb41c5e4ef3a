// ============================================================================
// PROMETHEUS METRICS
// ============================================================================

use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

lazy_static! {
    // ========================================================================
    // HTTP REQUEST METRICS
    // ========================================================================

    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "endpoint", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "endpoint"],
        vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // ========================================================================
    // CACHE METRICS
    // ========================================================================

    pub static ref CACHE_HITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_hits_total",
        "Total number of cache hits",
        &["cache_type", "cache_name"]
    )
    .unwrap();

    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_misses_total",
        "Total number of cache misses",
        &["cache_type", "cache_name"]
    )
    .unwrap();

    /// Backend failures that were absorbed (read treated as miss, write skipped)
    pub static ref CACHE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_errors_total",
        "Total number of cache backend errors",
        &["cache_type", "operation"]
    )
    .unwrap();

    pub static ref CACHE_INVALIDATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_invalidations_total",
        "Total number of cache invalidation calls",
        &["cache_type", "kind", "status"]
    )
    .unwrap();
}

pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, endpoint])
        .observe(duration_secs);
}

/// Record a cache lookup outcome
pub fn record_cache_access(cache_type: &str, cache_name: &str, hit: bool) {
    if hit {
        CACHE_HITS_TOTAL
            .with_label_values(&[cache_type, cache_name])
            .inc();
    } else {
        CACHE_MISSES_TOTAL
            .with_label_values(&[cache_type, cache_name])
            .inc();
    }
}

pub fn record_cache_error(cache_type: &str, operation: &str) {
    CACHE_ERRORS_TOTAL
        .with_label_values(&[cache_type, operation])
        .inc();
}

/// `kind` is `key` or `pattern`
pub fn record_cache_invalidation(cache_type: &str, kind: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    CACHE_INVALIDATIONS_TOTAL
        .with_label_values(&[cache_type, kind, status])
        .inc();
}
