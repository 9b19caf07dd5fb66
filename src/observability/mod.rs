//! Observability infrastructure.
//!
//! Provides:
//! - Structured tracing via `tracing-subscriber`

pub mod tracing;
