//! HTTP request handlers for the protected API.
//!
//! Every handler here runs behind the auth middleware, including the
//! fallback, so a 404 is only ever returned to an authenticated caller.

pub mod user_info;

pub use api_test::get_api_test;
pub use user_info::get_user_info;

use crate::errors::ApiError;

/// Fallback for any path without a handler.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
