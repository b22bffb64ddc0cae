//! Named pipe fixtures and producer helpers.
//!
//! Producers follow the bridge's contract: open the pipe for writing, write
//! one message, close. Opening for writing blocks until a reader has the pipe
//! open, so the helpers run on their own threads.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pipey_core::PipeHandle;
use tempfile::TempDir;

/// A FIFO inside a temporary directory.
///
/// The directory (and the pipe with it) is deleted when this value is
/// dropped, even on panic.
pub struct TestPipe {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestPipe {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("pipey.pipe");
        PipeHandle::create(&path).expect("failed to create test pipe");
        Self {
            path,
            _temp_dir: temp_dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for TestPipe {
    fn default() -> Self {
        Self::new()
    }
}

/// After `delay`, write `payload` as one message and close the pipe.
pub fn spawn_writer(
    path: impl AsRef<Path>,
    payload: Vec<u8>,
    delay: Duration,
) -> JoinHandle<io::Result<()>> {
    let path = path.as_ref().to_path_buf();
    thread::spawn(move || {
        thread::sleep(delay);
        let mut pipe = OpenOptions::new().write(true).open(&path)?;
        pipe.write_all(&payload)
    })
}

/// Write `partial` and keep the pipe open for `hold` before closing, like a
/// producer that stalls mid-message.
pub fn spawn_stalled_writer(
    path: impl AsRef<Path>,
    partial: Vec<u8>,
    hold: Duration,
) -> JoinHandle<io::Result<()>> {
    let path = path.as_ref().to_path_buf();
    thread::spawn(move || {
        let mut pipe = OpenOptions::new().write(true).open(&path)?;
        pipe.write_all(&partial)?;
        thread::sleep(hold);
        Ok(())
    })
}
