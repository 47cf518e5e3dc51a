//! API error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Bodies are fixed strings: the reason a token was rejected is logged
//! server-side and never returned to the client.

use crate::auth::AuthError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Value of the `WWW-Authenticate` header on every 401.
const WWW_AUTHENTICATE_VALUE: &str = "Bearer realm=\"api\"";

/// API error type.
///
/// Maps to HTTP status codes:
/// - Unauthorized: 401 Unauthorized
/// - NotFound: 404 Not Found
/// - FailedClosed: 401 Unauthorized
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("Endpoint not found")]
    NotFound,

    /// An unexpected failure inside the request pipeline. Treated as a
    /// rejection so the auth path never answers with a 5xx.
    #[error("Request failed closed: {0}")]
    FailedClosed(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) | ApiError::FailedClosed(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::NotFound => "Endpoint not found",
            ApiError::FailedClosed(detail) => {
                // Log actual error server-side, return the generic rejection to client
                tracing::error!(target: "api.errors", error = %detail, "Request failed closed");
                "Unauthorized"
            }
        };

        let mut response = (status, Json(ErrorResponse { error: message })).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(WWW_AUTHENTICATE_VALUE),
            );
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{KeyError, KeyFetchError};
    use axum::body::Body;
    use http_body_util::BodyExt;

    // Helper function to read the response body as JSON
    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_unauthorized_keeps_detail() {
        let error = ApiError::from(AuthError::AudienceMismatch);
        assert_eq!(
            format!("{}", error),
            "Unauthorized: token audience does not match"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Unauthorized(AuthError::MissingToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::FailedClosed("boom".to_string()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_unauthorized_body_is_identical_for_every_kind() {
        let errors = [
            AuthError::MissingToken,
            AuthError::MalformedToken,
            AuthError::AlgorithmMismatch("none".to_string()),
            AuthError::KeyResolutionFailed(KeyError::NotFound {
                kid: "k9".to_string(),
            }),
            AuthError::KeyResolutionFailed(KeyError::Fetch(KeyFetchError::Status(500))),
            AuthError::BadSignature,
            AuthError::Expired,
            AuthError::NotYetValid,
            AuthError::IssuerMismatch,
            AuthError::AudienceMismatch,
            AuthError::MissingSubject,
        ];

        for error in errors {
            let response = ApiError::from(error).into_response();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(
                response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
                "Bearer realm=\"api\""
            );
            let body = read_body_json(response.into_body()).await;
            assert_eq!(body, serde_json::json!({"error": "Unauthorized"}));
        }
    }

    #[tokio::test]
    async fn test_not_found_response() {
        let response = ApiError::NotFound.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body, serde_json::json!({"error": "Endpoint not found"}));
    }

    #[tokio::test]
    async fn test_failed_closed_is_indistinguishable_from_rejection() {
        let response = ApiError::FailedClosed("handler panicked".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer realm=\"api\""
        );
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body, serde_json::json!({"error": "Unauthorized"}));
    }
}
