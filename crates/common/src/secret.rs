//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] wrappers used for bearer tokens on their way
//! from the `Authorization` header to the verifier. `SecretString` implements
//! `Debug` with redaction, so a struct or span field that holds one can be
//! logged without leaking the token.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct BearerCredentials {
//!     scheme: &'static str,
//!     token: SecretString,
//! }
//!
//! let creds = BearerCredentials {
//!     scheme: "Bearer",
//!     token: SecretString::from("eyJhbGciOiJSUzI1NiJ9.e30.sig"),
//! };
//!
//! let logged = format!("{creds:?}");
//! assert!(!logged.contains("eyJhbGci"));
//!
//! // The raw value is only reachable through an explicit call.
//! let raw: &str = creds.token.expose_secret();
//! assert!(raw.starts_with("eyJ"));
//! ```
//!
//! Use `SecretString` for bearer tokens and any other credential material
//! that crosses a function boundary.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
