//! Token Verifier.
//!
//! Validates bearer JWTs issued by the identity provider using public keys
//! fetched through the [`JwksClient`].
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256 is accepted; the token's `alg` is compared against that fixed
//!   value and never used to choose a verifier
//! - Checks run in a fixed order and the first failure is returned:
//!   structure, algorithm, key, signature, timing, issuer, audience, subject
//! - The raw token is never logged; only the rejection kind is

use crate::auth::claims::{audiences, Claims};
use crate::auth::jwks::{JwksClient, SigningKey};
use crate::auth::{AuthError, AuthResult};
use crate::observability::metrics::record_token_validation;
use common::jwt::{inspect_header, validate_iat};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// The single algorithm tokens may be signed with.
pub const ALLOWED_ALGORITHM: Algorithm = Algorithm::RS256;

const ALLOWED_ALGORITHM_NAME: &str = "RS256";

/// JWT validator using the provider's JWKS.
pub struct JwtValidator {
    /// JWKS client for fetching public keys.
    jwks_client: Arc<JwksClient>,

    /// Expected `iss`, compared exactly.
    issuer: String,

    /// Audience that `aud` must contain.
    audience: String,

    /// Leeway for `exp`, `nbf` and `iat`.
    clock_skew: Duration,
}

impl JwtValidator {
    /// Create a new JWT validator.
    pub fn new(
        jwks_client: Arc<JwksClient>,
        issuer: String,
        audience: String,
        clock_skew: Duration,
    ) -> Self {
        Self {
            jwks_client,
            issuer,
            audience,
            clock_skew,
        }
    }

    /// Validate a bearer token and return its claims.
    ///
    /// Verification is never retried; every failure is terminal for the
    /// request. The outcome is counted by result kind.
    ///
    /// # Errors
    ///
    /// Returns the first [`AuthError`] hit by the pipeline.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &SecretString) -> AuthResult {
        let result = self.verify(token.expose_secret()).await;

        match &result {
            Ok(_) => {
                tracing::debug!(target: "api.auth.jwt", "Token validated successfully");
                record_token_validation("success");
            }
            Err(e) => {
                tracing::debug!(target: "api.auth.jwt", kind = e.kind(), error = %e, "Token rejected");
                record_token_validation(e.kind());
            }
        }

        result
    }

    async fn verify(&self, token: &str) -> AuthResult {
        // 1. Structure (includes size check via common::jwt)
        let header = inspect_header(token).map_err(|e| {
            tracing::debug!(target: "api.auth.jwt", error = ?e, "Token header inspection failed");
            AuthError::MalformedToken
        })?;

        // 2. Fixed algorithm policy
        if header.alg != ALLOWED_ALGORITHM_NAME {
            return Err(AuthError::AlgorithmMismatch(header.alg));
        }

        let kid = header.require_kid().map_err(|_| AuthError::MalformedToken)?;

        // 3. Key resolution
        let key = self.jwks_client.get_key(kid).await?;

        // 4-5. Signature, then exp/nbf
        let payload = verify_token(token, &key, self.clock_skew)?;

        // 5-8. exp/nbf/iat, iss, aud, sub
        self.check_claims(payload)
    }

    fn check_claims(&self, payload: Map<String, Value>) -> AuthResult {
        check_timing(&payload, self.clock_skew, chrono::Utc::now().timestamp())?;

        if payload.get("iss").and_then(Value::as_str) != Some(self.issuer.as_str()) {
            return Err(AuthError::IssuerMismatch);
        }

        let audience_matches = payload
            .get("aud")
            .is_some_and(|aud| audiences(aud).iter().any(|a| *a == self.audience));
        if !audience_matches {
            return Err(AuthError::AudienceMismatch);
        }

        Claims::from_payload(payload)
    }
}

/// Check `exp`, `nbf` and `iat` against `now` (Unix seconds).
///
/// `jsonwebtoken` only enforces timing claims it can parse as unsigned
/// integers and silently skips anything else, so every timing claim is
/// re-checked here. A claim that is present but not a number is
/// `MalformedToken`; negative values are ordinary dates in the past.
fn check_timing(
    payload: &Map<String, Value>,
    clock_skew: Duration,
    now: i64,
) -> Result<(), AuthError> {
    let skew = clock_skew.as_secs_f64();
    #[allow(clippy::cast_precision_loss)]
    let now_secs = now as f64;

    if let Some(exp) = numeric_date(payload, "exp")? {
        if exp < now_secs - skew {
            return Err(AuthError::Expired);
        }
    }

    if let Some(nbf) = numeric_date(payload, "nbf")? {
        if nbf > now_secs + skew {
            return Err(AuthError::NotYetValid);
        }
    }

    if let Some(iat) = numeric_date(payload, "iat")? {
        #[allow(clippy::cast_possible_truncation)]
        let iat = iat.ceil() as i64;
        validate_iat(iat, clock_skew).map_err(|_| AuthError::NotYetValid)?;
    }

    Ok(())
}

/// Read a NumericDate claim, if present.
fn numeric_date(payload: &Map<String, Value>, name: &str) -> Result<Option<f64>, AuthError> {
    match payload.get(name) {
        None => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| {
            tracing::debug!(target: "api.auth.jwt", claim = name, "Timing claim is not a number");
            AuthError::MalformedToken
        }),
    }
}

/// Verify the RS256 signature and the `exp`/`nbf` claims.
///
/// Issuer, audience and required claims are left to the caller so that
/// their failures can be reported in pipeline order.
pub fn verify_token(
    token: &str,
    key: &SigningKey,
    clock_skew: Duration,
) -> Result<Map<String, Value>, AuthError> {
    let mut validation = Validation::new(ALLOWED_ALGORITHM);
    validation.leeway = clock_skew.as_secs();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Map<String, Value>>(token, key.decoding_key(), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(target: "api.auth.jwt", kid = %key.kid(), error = %e, "Token verification failed");
            match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidRsaKey(_) | ErrorKind::Crypto(_) => {
                    AuthError::BadSignature
                }
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::ImmatureSignature => AuthError::NotYetValid,
                ErrorKind::InvalidAlgorithm => {
                    AuthError::AlgorithmMismatch(ALLOWED_ALGORITHM_NAME.to_string())
                }
                _ => AuthError::MalformedToken,
            }
        })
}
