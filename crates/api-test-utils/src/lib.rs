//! # API Test Utilities
//!
//! Shared test utilities for the protected API service.
//!
//! This crate provides:
//! - Deterministic RSA signing keys and JWKS documents (`crypto_fixtures`)
//! - A builder for signed, unsigned and tampered tokens (`token_builders`)
//! - Server harness (`TestApiServer` for E2E tests against a mock JWKS)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use api_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestApiServer::spawn().await?;
//!     let token = TestTokenBuilder::new().for_user("user123").build();
//!
//!     let response = server.get("/api/test", Some(&token)).await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
