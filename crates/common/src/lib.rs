//! Common utilities shared across the protected API crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (header inspection, size limits, timing claims)
pub mod jwt;
