//! Protected API Service Library
//!
//! A small HTTP API whose every endpoint requires a bearer JWT issued by an
//! external identity provider (RS256, keys published as a JWKS).
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/jwt.rs -> auth/jwks.rs
//!               -> handlers/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Key Cache, Token Verifier and verified claims
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication, logging, metrics and security headers
//! - `observability` - Metrics definitions and recorder setup
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
