#![deny(unsafe_code)]

//! pipey core: serves a named pipe over HTTP.
//!
//! A producer writes a JSON document into a FIFO and closes it; each HTTP
//! request performs one bounded read of the FIFO and returns what was
//! written. Reads are serialized: at most one request touches the pipe at a
//! time.

/// Process lifecycle: pipe creation, serving, signal-triggered cleanup.
pub mod bridge;
/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Single-reader exclusivity token.
pub mod exclusive;
/// Named pipe creation and removal.
pub mod fifo;
/// Deadline-bounded readiness wait on a descriptor.
pub mod readiness;
/// Bounded-time pipe reads.
pub mod reader;
/// axum request handler and listener.
pub mod server;

pub use bridge::{Bridge, BridgeError, ShutdownHandle, ShutdownReason};
pub use exclusive::{ExclusiveAccess, ExclusivityToken};
pub use fifo::{PipeError, PipeHandle};
pub use reader::{BoundedPipeReader, ReadError, read_with_timeout};
pub use server::{BridgeState, ServeError};
