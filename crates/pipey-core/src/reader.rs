//! Bounded-time reads from the named pipe.
//!
//! One read attempt goes `Opening -> WaitingReadable -> Reading` and ends in
//! exactly one of: the bytes the writer sent, a timeout, or an open/read
//! failure. Nothing is retried within an attempt.
//!
//! Opening a FIFO for reading normally blocks until a writer shows up, so the
//! pipe is opened with `O_NONBLOCK` and readiness is awaited with an explicit
//! deadline instead. The descriptor is closed when the `File` drops, on every
//! exit path.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use nix::fcntl::OFlag;
use tracing::{debug, trace};

use crate::readiness::{Readiness, deadline_after, wait_readable};

/// Failure modes of a single read attempt.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("failed to open pipe {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("no data within {0:?}")]
    Timeout(Duration),

    #[error("waiting for the pipe failed: {0}")]
    Poll(#[source] io::Error),

    #[error("error reading from pipe: {0}")]
    Read(#[source] io::Error),

    #[error("writer stalled mid-message after {received} bytes")]
    Stalled { received: usize },
}

impl ReadError {
    /// Whether the attempt ended because no writer produced data in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Reads one message from a named pipe, waiting at most `timeout` for it.
#[derive(Debug, Clone)]
pub struct BoundedPipeReader {
    path: PathBuf,
    timeout: Duration,
}

impl BoundedPipeReader {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Perform one blocking read attempt. See [`read_with_timeout`].
    pub fn read(&self) -> Result<Vec<u8>, ReadError> {
        read_with_timeout(&self.path, self.timeout)
    }
}

/// Read everything a writer sends to the pipe at `path` until it closes its
/// end, giving up if the pipe does not become readable within `timeout`.
///
/// A writer that connects but stops writing without closing is only waited
/// on until the same deadline, then reported as [`ReadError::Stalled`].
/// The returned bytes are exactly what the writer wrote.
pub fn read_with_timeout(path: &Path, timeout: Duration) -> Result<Vec<u8>, ReadError> {
    let deadline = deadline_after(timeout);

    let mut pipe = OpenOptions::new()
        .read(true)
        .custom_flags(OFlag::O_NONBLOCK.bits())
        .open(path)
        .map_err(|source| ReadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    match wait_readable(pipe.as_fd(), timeout).map_err(ReadError::Poll)? {
        Readiness::Ready => trace!(path = %path.display(), "Pipe readable"),
        Readiness::TimedOut => return Err(ReadError::Timeout(timeout)),
    }

    let data = drain(&mut pipe, deadline)?;
    debug!(path = %path.display(), bytes = data.len(), "Read message from pipe");
    Ok(data)
}

/// Read until end-of-input, waiting out short gaps between writes.
fn drain(pipe: &mut File, deadline: Instant) -> Result<Vec<u8>, ReadError> {
    let mut data = Vec::new();
    loop {
        // read_to_end keeps whatever it read before hitting WouldBlock.
        match pipe.read_to_end(&mut data) {
            Ok(_) => return Ok(data),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match wait_readable(pipe.as_fd(), remaining).map_err(ReadError::Poll)? {
                    Readiness::Ready => {}
                    Readiness::TimedOut => {
                        return Err(ReadError::Stalled {
                            received: data.len(),
                        });
                    }
                }
            }
            Err(e) => return Err(ReadError::Read(e)),
        }
    }
}
