//! Rejection taxonomy for the token verification pipeline.
//!
//! Every variant collapses to the same 401 response at the router boundary.
//! The variant itself is only ever logged and counted, via [`AuthError::kind`].

use thiserror::Error;

/// Failure to fetch the provider's key set.
///
/// `Clone` so that every caller coalesced onto one in-flight fetch can
/// receive the same outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyFetchError {
    /// Connection, TLS or timeout failure.
    #[error("key set request failed: {0}")]
    Transport(String),

    /// Endpoint answered with a non-success status.
    #[error("key set endpoint returned HTTP {0}")]
    Status(u16),

    /// Response body was not a key-set document.
    #[error("key set response could not be parsed: {0}")]
    Body(String),
}

/// Failure to resolve a signing key for a `kid`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    /// The key set (fresh after one refetch) has no usable key with this ID.
    #[error("no signing key with kid '{kid}'")]
    NotFound { kid: String },

    /// The key set could not be fetched.
    #[error(transparent)]
    Fetch(#[from] KeyFetchError),
}

/// Why a bearer token was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no bearer token supplied")]
    MissingToken,

    #[error("token is not a compact three-part JWT")]
    MalformedToken,

    #[error("token algorithm '{0}' is not allowed")]
    AlgorithmMismatch(String),

    #[error("signing key could not be resolved: {0}")]
    KeyResolutionFailed(#[from] KeyError),

    #[error("token signature does not verify")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is not valid yet")]
    NotYetValid,

    #[error("token issuer does not match")]
    IssuerMismatch,

    #[error("token audience does not match")]
    AudienceMismatch,

    #[error("token subject is missing or empty")]
    MissingSubject,
}

impl AuthError {
    /// Stable, low-cardinality label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::AlgorithmMismatch(_) => "algorithm_mismatch",
            AuthError::KeyResolutionFailed(KeyError::NotFound { .. }) => "key_not_found",
            AuthError::KeyResolutionFailed(KeyError::Fetch(_)) => "key_fetch_error",
            AuthError::BadSignature => "bad_signature",
            AuthError::Expired => "expired",
            AuthError::NotYetValid => "not_yet_valid",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::MissingSubject => "missing_subject",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_resolution_kinds_distinguish_cause() {
        let not_found = AuthError::from(KeyError::NotFound {
            kid: "k9".to_string(),
        });
        let fetch = AuthError::from(KeyError::from(KeyFetchError::Status(500)));

        assert_eq!(not_found.kind(), "key_not_found");
        assert_eq!(fetch.kind(), "key_fetch_error");
    }

    #[test]
    fn test_display_includes_cause() {
        let err = AuthError::from(KeyError::from(KeyFetchError::Status(503)));
        assert_eq!(
            err.to_string(),
            "signing key could not be resolved: key set endpoint returned HTTP 503"
        );
    }

    #[test]
    fn test_kinds_are_unique() {
        let all = [
            AuthError::MissingToken,
            AuthError::MalformedToken,
            AuthError::AlgorithmMismatch("HS256".to_string()),
            AuthError::KeyResolutionFailed(KeyError::NotFound {
                kid: "k".to_string(),
            }),
            AuthError::KeyResolutionFailed(KeyError::Fetch(KeyFetchError::Body(
                "eof".to_string(),
            ))),
            AuthError::BadSignature,
            AuthError::Expired,
            AuthError::NotYetValid,
            AuthError::IssuerMismatch,
            AuthError::AudienceMismatch,
            AuthError::MissingSubject,
        ];

        let mut kinds: Vec<&str> = all.iter().map(AuthError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), all.len());
    }
}
