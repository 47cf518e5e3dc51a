//! Bearer token authentication.
//!
//! - `jwks` - Key Cache for the identity provider's signing keys
//! - `jwt` - Token Verifier
//! - `claims` - Verified claim set

pub mod claims;
mod error;
pub mod jwks;
pub mod jwt;

pub use claims::Claims;
pub use error::{AuthError, KeyError, KeyFetchError};
pub use jwks::{JwksClient, SigningKey};
pub use jwt::JwtValidator;

/// Outcome of verifying one bearer token.
pub type AuthResult = Result<Claims, AuthError>;
