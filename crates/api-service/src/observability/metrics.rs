//! Metrics definitions for the protected API.
//!
//! All metrics follow Prometheus naming conventions:
//! - `api_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: standard HTTP methods, anything else is `OTHER`
//! - `endpoint`: 3 values (`/api/test`, `/api/user-info`, `/other`)
//! - `status`: 2-3 values per metric
//! - `result`: bounded by `AuthError::kind` plus `success`
//!
//! Request paths never become labels verbatim; unknown paths collapse to `/other`.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle
/// for rendering scrapes.
///
/// Must be called before any metrics are recorded to be captured.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // HTTP request buckets - p95 target well under 200ms
        .set_buckets_for_metric(
            Matcher::Prefix("api_http".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Key-set fetch buckets - external call bounded by the 10s client timeout
        .set_buckets_for_metric(
            Matcher::Prefix("api_jwks".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `api_http_requests_total`, `api_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status_code` / `status`
///
/// Captures every response, including 401 rejections and 404 fallbacks.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_method = normalize_method(method);
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("api_http_request_duration_seconds",
        "method" => normalized_method,
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("api_http_requests_total",
        "method" => normalized_method,
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/rejected/error.
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        401 => "rejected",
        _ => "error",
    }
}

/// Clients choose the method, so only the standard ones become labels.
fn normalize_method(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "PATCH" => "PATCH",
        "DELETE" => "DELETE",
        "OPTIONS" => "OPTIONS",
        _ => "OTHER",
    }
}

/// Normalize a request path to a bounded endpoint label.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/api/test" => "/api/test",
        "/api/user-info" => "/api/user-info",
        _ => "/other",
    }
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record the outcome of one token verification.
///
/// Metric: `api_token_validations_total`
/// Labels: `result` (`success` or an `AuthError::kind` label)
pub fn record_token_validation(result: &'static str) {
    counter!("api_token_validations_total", "result" => result).increment(1);
}

// ============================================================================
// Key Cache Metrics
// ============================================================================

/// Record a key-set fetch against the identity provider.
///
/// Metric: `api_jwks_fetches_total`, `api_jwks_fetch_duration_seconds`
/// Labels: `status` (`success`, `transport_error`, `status_error`, `body_error`)
pub fn record_jwks_fetch(status: &'static str, duration: Duration) {
    histogram!("api_jwks_fetch_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
    counter!("api_jwks_fetches_total", "status" => status).increment(1);
}

/// Record a key-cache lookup.
///
/// Metric: `api_jwks_cache_lookups_total`
/// Labels: `result` (`hit`, `miss`, `stale`, `stale_fallback`)
pub fn record_jwks_lookup(result: &'static str) {
    counter!("api_jwks_cache_lookups_total", "result" => result).increment(1);
}

// ============================================================================
// Tests
// ============================================================================
