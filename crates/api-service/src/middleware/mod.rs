//! Middleware for the protected API.
//!
//! # Components
//!
//! - `auth` - Bearer token authentication for every API route
//! - `http_metrics` - HTTP request metrics
//! - `request_log` - Per-request trace span and completion log
//! - `security_headers` - Fixed response headers

pub mod auth;
pub mod http_metrics;
pub mod request_log;
pub mod security_headers;

pub use auth::{require_auth, AuthState};
pub use http_metrics::http_metrics_middleware;
pub use request_log::request_log_layer;
