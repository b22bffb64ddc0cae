//! Deadline-bounded readiness wait on a file descriptor.
//!
//! Wraps `poll(2)`: the caller learns whether the descriptor became readable
//! before the timeout elapsed, without consuming any data.

use std::io;
use std::os::fd::BorrowedFd;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

/// Result of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Data (or end-of-input) is available; a read will not block.
    Ready,
    /// The timeout elapsed with nothing to read.
    TimedOut,
}

/// Wait until `fd` is readable or `timeout` has elapsed.
///
/// Hang-up and error conditions count as readable so the following read can
/// report EOF or the error. A zero timeout only checks the current state.
/// Waits interrupted by a signal resume with the time that is left.
pub fn wait_readable(fd: BorrowedFd<'_>, timeout: Duration) -> io::Result<Readiness> {
    let deadline = deadline_after(timeout);
    let ready = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];

        match poll(&mut fds, PollTimeout::from(poll_millis(remaining))) {
            Ok(0) => {
                if remaining.is_zero() || Instant::now() >= deadline {
                    return Ok(Readiness::TimedOut);
                }
            }
            Ok(_) => {
                let revents = fds[0].revents().unwrap_or_else(PollFlags::empty);
                if revents.contains(PollFlags::POLLNVAL) {
                    return Err(io::Error::from(Errno::EBADF));
                }
                if revents.intersects(ready) {
                    return Ok(Readiness::Ready);
                }
            }
            Err(Errno::EINTR) => {}
            Err(errno) => return Err(io::Error::from(errno)),
        }
    }
}

/// The instant `timeout` from now. Timeouts past the clock's range are
/// clamped to a deadline that is never reached in practice.
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 86_400);

    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Convert to poll's millisecond timeout, rounding up so a wait never ends
/// early. Durations beyond one call's range are covered by the caller's loop.
fn poll_millis(remaining: Duration) -> u16 {
    let millis = remaining.as_micros().div_ceil(1000);
    u16::try_from(millis).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, OpenOptions};
    use std::io::Write;
    use std::os::fd::AsFd;
    use std::os::unix::fs::OpenOptionsExt;

    use nix::fcntl::OFlag;
    use tempfile::TempDir;

    use crate::fifo::PipeHandle;

    fn open_nonblocking(path: &std::path::Path) -> File {
        OpenOptions::new()
            .read(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(path)
            .unwrap()
    }

    #[test]
    fn test_poll_millis_rounds_up() {
        assert_eq!(poll_millis(Duration::ZERO), 0);
        assert_eq!(poll_millis(Duration::from_micros(1)), 1);
        assert_eq!(poll_millis(Duration::from_micros(1_500)), 2);
        assert_eq!(poll_millis(Duration::from_millis(250)), 250);
        assert_eq!(poll_millis(Duration::from_secs(3600)), u16::MAX);
    }

    #[test]
    fn test_deadline_after_clamps_huge_timeouts() {
        let before = Instant::now();
        assert!(deadline_after(Duration::MAX) > before + Duration::from_secs(86_400));
        assert!(deadline_after(Duration::from_secs_f64(1e19)) > before);

        let near = deadline_after(Duration::from_millis(50));
        assert!(near >= before + Duration::from_millis(50));
    }

    #[test]
    fn test_huge_timeout_still_reports_ready() {
        let tmp = TempDir::new().unwrap();
        let pipe = PipeHandle::create(tmp.path().join("p")).unwrap();
        let reader = open_nonblocking(pipe.path());

        let mut writer = OpenOptions::new().write(true).open(pipe.path()).unwrap();
        writer.write_all(b"{}").unwrap();

        let readiness = wait_readable(reader.as_fd(), Duration::MAX).unwrap();
        assert_eq!(readiness, Readiness::Ready);
    }

    #[test]
    fn test_times_out_without_writer() {
        let tmp = TempDir::new().unwrap();
        let pipe = PipeHandle::create(tmp.path().join("p")).unwrap();
        let reader = open_nonblocking(pipe.path());

        let start = Instant::now();
        let readiness = wait_readable(reader.as_fd(), Duration::from_millis(100)).unwrap();
        assert_eq!(readiness, Readiness::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_zero_timeout_returns_immediately() {
        let tmp = TempDir::new().unwrap();
        let pipe = PipeHandle::create(tmp.path().join("p")).unwrap();
        let reader = open_nonblocking(pipe.path());

        let start = Instant::now();
        let readiness = wait_readable(reader.as_fd(), Duration::ZERO).unwrap();
        assert_eq!(readiness, Readiness::TimedOut);
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_ready_once_data_is_written() {
        let tmp = TempDir::new().unwrap();
        let pipe = PipeHandle::create(tmp.path().join("p")).unwrap();
        let reader = open_nonblocking(pipe.path());

        let mut writer = OpenOptions::new().write(true).open(pipe.path()).unwrap();
        writer.write_all(b"{}").unwrap();

        let readiness = wait_readable(reader.as_fd(), Duration::ZERO).unwrap();
        assert_eq!(readiness, Readiness::Ready);
    }

    #[test]
    fn test_ready_when_writer_hangs_up() {
        let tmp = TempDir::new().unwrap();
        let pipe = PipeHandle::create(tmp.path().join("p")).unwrap();
        let reader = open_nonblocking(pipe.path());

        drop(OpenOptions::new().write(true).open(pipe.path()).unwrap());

        let readiness = wait_readable(reader.as_fd(), Duration::from_millis(500)).unwrap();
        assert_eq!(readiness, Readiness::Ready);
    }
}
