#![deny(unsafe_code)]

//! Shared test utilities for the pipey workspace.
//!
//! Provides pipe fixtures and producer helpers, a config builder, log
//! capture, a tiny HTTP client and tracing setup so that individual crate
//! tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! pipey-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod http;
pub mod log_capture;
pub mod pipe;
pub mod tracing_setup;
