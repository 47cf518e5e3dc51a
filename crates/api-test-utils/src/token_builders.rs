//! Builder patterns for test tokens
//!
//! Provides a fluent API for minting signed (and deliberately mis-signed)
//! JWTs shaped like the identity provider's access tokens.

use crate::crypto_fixtures::{TestKey, TEST_AUDIENCE, TEST_ISSUER, TEST_KEY_1};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for creating test JWTs
///
/// Defaults to a token that the test API accepts: `kid` "k1", subject
/// "user123", the test issuer and audience, valid for one hour.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("alice")
///     .with_claim("email", "alice@example.com")
///     .expires_in(3600)
///     .build();
/// ```
pub struct TestTokenBuilder {
    kid: Option<String>,
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!("user123"));
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("aud".to_string(), json!(TEST_AUDIENCE));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        claims.insert("iat".to_string(), json!(now.timestamp()));

        Self {
            kid: Some(TEST_KEY_1.kid.to_string()),
            claims,
        }
    }

    /// Set the subject
    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", subject)
    }

    /// Set the issuer
    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", issuer)
    }

    /// Set the audience (a string or an array of strings)
    pub fn with_audience(self, audience: impl Into<Value>) -> Self {
        self.with_claim("aud", audience)
    }

    /// Set expiration in seconds from now (negative for the past)
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("exp", exp)
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(self, seconds: i64) -> Self {
        let nbf = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("nbf", nbf)
    }

    /// Set issued-at timestamp
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", timestamp)
    }

    /// Set an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.claims.insert(name.to_string(), value.into());
        self
    }

    /// Remove a claim, including a default one
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Set the header `kid`
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    /// Omit the header `kid`
    pub fn without_kid(mut self) -> Self {
        self.kid = None;
        self
    }

    /// The claims as a JSON value
    pub fn claims(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Sign with RS256 using the primary test key
    pub fn build(self) -> String {
        self.sign(&TEST_KEY_1)
    }

    /// Sign with RS256 using `key`
    pub fn sign(self, key: &TestKey) -> String {
        self.sign_with_algorithm(key, Algorithm::RS256)
    }

    /// Sign with any RSA algorithm using `key`
    pub fn sign_with_algorithm(self, key: &TestKey, algorithm: Algorithm) -> String {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_pem.as_bytes())
            .expect("test key PEM should parse");
        self.encode(algorithm, &encoding_key)
    }

    /// Sign with HS256 using `secret`
    pub fn sign_hs256(self, secret: &[u8]) -> String {
        self.encode(Algorithm::HS256, &EncodingKey::from_secret(secret))
    }

    /// Serialize with `alg: none` and an empty signature
    pub fn unsigned(self) -> String {
        let mut header = json!({"alg": "none", "typ": "JWT"});
        if let Some(kid) = &self.kid {
            header["kid"] = json!(kid);
        }
        let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_b64 = URL_SAFE_NO_PAD.encode(self.claims().to_string());
        format!("{header_b64}.{payload_b64}.")
    }

    fn encode(self, algorithm: Algorithm, key: &EncodingKey) -> String {
        let mut header = Header::new(algorithm);
        header.kid = self.kid.clone();
        encode(&header, &self.claims, key).expect("test token should encode")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
