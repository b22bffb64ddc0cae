//! Named pipe lifecycle: creation at startup, removal at shutdown.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tracing::{debug, error, info};

/// Permission bits of the created pipe (read/write for everyone).
pub const PIPE_MODE: u32 = 0o666;

/// Errors from pipe creation.
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    #[error("failed to remove stale entry at {path}: {source}")]
    RemoveStale { path: PathBuf, source: io::Error },

    #[error("failed to create named pipe at {path}: {source}")]
    Creation { path: PathBuf, source: io::Error },
}

/// A named pipe that exists on the filesystem for the lifetime of the process.
///
/// Removal is explicit ([`PipeHandle::destroy`]), not tied to `Drop`: a pipe
/// left behind by an abnormal exit is replaced on the next start.
#[derive(Debug, Clone)]
pub struct PipeHandle {
    path: PathBuf,
}

impl PipeHandle {
    /// Create a fresh named pipe at `path`, replacing whatever was there.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, PipeError> {
        let path = path.into();
        remove_entry(&path).map_err(|source| PipeError::RemoveStale {
            path: path.clone(),
            source,
        })?;

        mkfifo(&path, Mode::from_bits_truncate(PIPE_MODE)).map_err(|errno| {
            PipeError::Creation {
                path: path.clone(),
                source: io::Error::from(errno),
            }
        })?;

        // mkfifo honours the umask; widen back to the full mode.
        fs::set_permissions(&path, fs::Permissions::from_mode(PIPE_MODE)).map_err(|source| {
            PipeError::Creation {
                path: path.clone(),
                source,
            }
        })?;

        info!(path = %path.display(), "Named pipe created");
        Ok(Self { path })
    }

    /// Filesystem path of the pipe.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the pipe from the filesystem. Best effort: failures are logged.
    pub fn destroy(&self) {
        destroy(&self.path);
    }
}

/// Remove the entry at `path`, logging instead of returning failures.
pub fn destroy(path: &Path) {
    info!(pipe = %path.display(), "Cleaning up");
    if let Err(e) = remove_entry(path) {
        error!(pipe = %path.display(), error = %e, "Could not remove the pipe");
    }
}

/// Remove a file or directory tree at `path`; absence counts as success.
fn remove_entry(path: &Path) -> io::Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
        Ok(()) => {
            debug!(path = %path.display(), "Removed existing entry");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::FileTypeExt;
    use tempfile::TempDir;

    fn is_fifo(path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|m| m.file_type().is_fifo())
            .unwrap_or(false)
    }

    #[test]
    fn test_create_makes_world_writable_fifo() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.pipe");

        let handle = PipeHandle::create(&path).unwrap();
        assert_eq!(handle.path(), path);
        assert!(is_fifo(&path));

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, PIPE_MODE);
    }

    #[test]
    fn test_create_replaces_stale_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.pipe");
        fs::write(&path, b"left over").unwrap();

        PipeHandle::create(&path).unwrap();
        assert!(is_fifo(&path));
    }

    #[test]
    fn test_create_replaces_stale_pipe() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.pipe");

        PipeHandle::create(&path).unwrap();
        PipeHandle::create(&path).unwrap();
        assert!(is_fifo(&path));
    }

    #[test]
    fn test_create_replaces_stale_directory() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.pipe");
        fs::create_dir_all(path.join("nested")).unwrap();
        fs::write(path.join("nested/file"), b"x").unwrap();

        PipeHandle::create(&path).unwrap();
        assert!(is_fifo(&path));
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing/data.pipe");

        let err = PipeHandle::create(&path).unwrap_err();
        assert!(matches!(err, PipeError::Creation { .. }));
        assert!(err.to_string().contains("data.pipe"));
    }

    #[test]
    fn test_destroy_removes_pipe() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.pipe");

        let handle = PipeHandle::create(&path).unwrap();
        handle.destroy();
        assert!(!path.exists());
    }

    #[test]
    fn test_destroy_missing_path_is_quiet() {
        let tmp = TempDir::new().unwrap();
        // Must not panic or error.
        destroy(&tmp.path().join("never-created.pipe"));
    }
}
