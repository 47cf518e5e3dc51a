//! Request logging layer.
//!
//! A `TraceLayer` that opens one span per request carrying method, path and
//! source address, and logs the outcome when the response is ready. Only
//! request metadata is recorded: never headers, so never the bearer token,
//! and never claims.

use axum::{
    extract::ConnectInfo,
    http::{Request, Response},
};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnRequest, MakeSpan, OnResponse, TraceLayer};
use tracing::Span;

/// Span factory recording method, path and source address.
///
/// The source address comes from `ConnectInfo`, so the server must be run
/// with `into_make_service_with_connect_info::<SocketAddr>()`; without it the
/// address is recorded as "unknown".
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            target: "api.middleware.request",
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            source = %request_source(request),
        )
    }
}

/// Completion log with status and latency.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogCompletion;

impl<B> OnResponse<B> for LogCompletion {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            target: "api.middleware.request",
            status = response.status().as_u16(),
            latency_ms,
            "Request completed"
        );
    }
}

/// The request logging layer type.
pub type RequestLogLayer =
    TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan, DefaultOnRequest, LogCompletion>;

/// Build the request logging layer.
pub fn request_log_layer() -> RequestLogLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_response(LogCompletion)
}

fn request_source<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.to_string())
}
