//! HTTP routes for the protected API.
//!
//! Defines the Axum router and application state.

use crate::auth::{JwksClient, JwtValidator};
use crate::config::Config;
use crate::errors::ApiError;
use crate::handlers;
use crate::middleware::{
    http_metrics_middleware, request_log_layer, require_auth, security_headers, AuthState,
};
use axum::{
    extract::State,
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;

/// Application state shared across all handlers.
///
/// Holds the one process-wide key cache (through the validator), so it is
/// built once at startup and injected into the router.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Token verifier backed by the shared key cache.
    pub jwt_validator: Arc<JwtValidator>,
}

impl AppState {
    /// Build the key cache and verifier described by `config`.
    pub fn new(config: Config) -> Self {
        let jwks_client = Arc::new(JwksClient::with_ttl(
            config.jwks_url.clone(),
            config.jwks_cache_ttl,
        ));
        let jwt_validator = Arc::new(JwtValidator::new(
            jwks_client,
            config.issuer.clone(),
            config.audience.clone(),
            Duration::from_secs(config.jwt_clock_skew_seconds),
        ));

        Self {
            config,
            jwt_validator,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/api/test` - Echo of the authenticated subject
/// - `/api/user-info` - Profile projection of the token claims
/// - Fallback - 404 `{"error":"Endpoint not found"}`
///
/// Dispatch is by path only. Every route, the fallback included, sits
/// behind the auth middleware.
pub fn build_routes(state: Arc<AppState>) -> Router {
    let auth_state = Arc::new(AuthState {
        jwt_validator: Arc::clone(&state.jwt_validator),
    });

    let api_routes = Router::new()
        .route("/api/test", any(handlers::get_api_test))
        .route("/api/user-info", any(handlers::get_user_info))
        .fallback(handlers::not_found)
        // `layer` rather than `route_layer` so the fallback is authenticated too
        .layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. request_log_layer - TraceLayer span and completion log
    // 2. http_metrics_middleware - Record ALL responses
    // 3. CatchPanicLayer - Panics fail closed as a generic 401
    // 4. Security headers (outermost) - Applied to every response
    let app = api_routes
        .layer(request_log_layer())
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(CatchPanicLayer::custom(handle_panic));

    security_headers::apply(app)
}

/// Build the Prometheus scrape routes, served on their own listener.
pub fn build_metrics_routes(metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle)
}

/// Handler for GET /metrics
#[tracing::instrument(skip_all, name = "api.metrics.scrape")]
async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

fn handle_panic(_panic: Box<dyn Any + Send + 'static>) -> Response {
    ApiError::FailedClosed("request pipeline panicked".to_string()).into_response()
}
