//! User info handler.
//!
//! Projects profile fields from the verified token claims.

use crate::auth::Claims;
use crate::routes::AppState;
use axum::{extract::State, Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Response for `/api/user-info` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoResponse {
    /// Subject (user ID).
    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserInfoResponse {
    /// Build the projection, preferring `{namespace}email` / `{namespace}name`
    /// over the bare claims.
    pub fn from_claims(claims: &Claims, namespace: &str) -> Self {
        Self {
            user_id: claims.sub.clone(),
            email: claims
                .namespaced_claim(namespace, "email")
                .map(ToString::to_string),
            name: claims
                .namespaced_claim(namespace, "name")
                .map(ToString::to_string),
        }
    }
}

/// Handler for GET /api/user-info
///
/// Requires valid authentication via the auth middleware.
///
/// ## Response
///
/// ```json
/// {
///   "userId": "auth0|abc123",
///   "email": "user@example.com",
///   "name": "Example User"
/// }
/// ```
#[instrument(skip_all, name = "api.handlers.user_info")]
pub async fn get_user_info(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Json<UserInfoResponse> {
    tracing::debug!(target: "api.handlers", "Returning user info");

    Json(UserInfoResponse::from_claims(
        &claims,
        &state.config.claims_namespace,
    ))
}
