//! Observability for the protected API.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
