//! Verified JWT claims.
//!
//! `Claims` is only ever built from a payload whose signature, timing,
//! issuer and audience have already been checked. The `sub` field is
//! redacted and the remaining claims are elided in Debug output.

use crate::auth::AuthError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Claims of an authenticated token.
#[derive(Clone, PartialEq, Serialize)]
pub struct Claims {
    /// Subject (user identifier), never empty - redacted in Debug output.
    pub sub: String,

    /// Issuer, equal to the configured issuer.
    pub iss: String,

    /// Audiences; contains the configured audience.
    pub aud: Vec<String>,

    /// Expiration timestamp (Unix epoch seconds), if the token carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds), if the token carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Every other claim, including provider-namespaced ones.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("extra", &format_args!("[{} claims]", self.extra.len()))
            .finish()
    }
}

impl Claims {
    /// Build claims from a verified payload.
    ///
    /// # Errors
    ///
    /// `MissingSubject` when `sub` is absent, not a string, or empty.
    pub fn from_payload(mut payload: Map<String, Value>) -> Result<Self, AuthError> {
        let sub = match payload.remove("sub") {
            Some(Value::String(sub)) if !sub.is_empty() => sub,
            _ => return Err(AuthError::MissingSubject),
        };

        let iss = match payload.remove("iss") {
            Some(Value::String(iss)) => iss,
            _ => String::new(),
        };

        let aud = payload
            .remove("aud")
            .map(|v| audiences(&v))
            .unwrap_or_default();

        let exp = payload.remove("exp").and_then(|v| v.as_i64());
        let iat = payload.remove("iat").and_then(|v| v.as_i64());

        Ok(Self {
            sub,
            iss,
            aud,
            exp,
            iat,
            extra: payload,
        })
    }

    /// Get a string claim by its exact key.
    pub fn string_claim(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Get a claim stored under `{namespace}{name}`, falling back to the bare `name`.
    pub fn namespaced_claim(&self, namespace: &str, name: &str) -> Option<&str> {
        self.string_claim(&format!("{namespace}{name}"))
            .or_else(|| self.string_claim(name))
    }
}

/// Read an `aud` claim as a list of audiences.
///
/// A string is a single audience; an array contributes its string members.
/// Anything else yields no audiences.
pub fn audiences(value: &Value) -> Vec<String> {
    match value {
        Value::String(aud) => vec![aud.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
