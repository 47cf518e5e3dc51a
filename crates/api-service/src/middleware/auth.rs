//! Authentication middleware.
//!
//! Extracts the bearer token from the `Authorization` header, validates it
//! with the [`JwtValidator`], and injects the verified [`Claims`] into the
//! request extensions. Every rejection becomes the same 401.

use crate::auth::{AuthError, JwtValidator};
use crate::errors::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use common::secret::SecretString;
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// JWT validator with JWKS client.
    pub jwt_validator: Arc<JwtValidator>,
}

/// Extract the bearer token from the Authorization header.
///
/// The `Bearer ` prefix is case-sensitive and the token is trimmed.
/// Returns `None` when the header is absent, not valid UTF-8, uses another
/// scheme, or carries an empty token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<SecretString> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;

    let token = auth_header.trim().strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }

    Some(SecretString::from(token.to_string()))
}

/// Authentication middleware.
///
/// # Response
///
/// - Returns 401 Unauthorized if the token is missing or invalid; the
///   validator is not invoked when no token is present
/// - Continues to next handler with `Claims` in extensions if token is valid
#[instrument(skip_all, name = "api.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = extract_bearer_token(req.headers()) else {
        return Err(reject(AuthError::MissingToken));
    };

    let claims = state
        .jwt_validator
        .validate(&token)
        .await
        .map_err(reject)?;

    // Store claims in request extensions for downstream handlers
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

fn reject(error: AuthError) -> ApiError {
    tracing::warn!(
        target: "api.middleware.auth",
        kind = error.kind(),
        error = %error,
        "Request rejected"
    );
    ApiError::Unauthorized(error)
}
