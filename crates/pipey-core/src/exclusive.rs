//! Single-reader serialization of pipe access.
//!
//! Every read attempt holds an [`ExclusiveAccess`] for its whole duration,
//! including the readiness wait. The guard is owned (`'static`), so it can be
//! moved into the blocking task doing the read and is released only when
//! that task finishes, whatever the outcome.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{trace, warn};

#[derive(Debug, Default)]
struct Counters {
    active: AtomicUsize,
    peak: AtomicUsize,
    acquisitions: AtomicU64,
}

/// Process-wide token granting the right to read the pipe.
///
/// Cloning shares the same token.
#[derive(Debug, Clone, Default)]
pub struct ExclusivityToken {
    lock: Arc<Mutex<()>>,
    counters: Arc<Counters>,
}

impl ExclusivityToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other attempt holds the token, then take it.
    pub async fn acquire(&self) -> ExclusiveAccess {
        let guard = Arc::clone(&self.lock).lock_owned().await;

        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        if active > 1 {
            warn!(active, "Exclusivity token held by more than one attempt");
        }
        self.counters.peak.fetch_max(active, Ordering::SeqCst);
        let seq = self.counters.acquisitions.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(seq, "Exclusivity token acquired");

        ExclusiveAccess {
            _guard: guard,
            counters: Arc::clone(&self.counters),
        }
    }

    /// Number of attempts currently holding the token (0 or 1).
    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous holders ever observed.
    pub fn peak(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    /// Total number of times the token has been acquired.
    pub fn acquisitions(&self) -> u64 {
        self.counters.acquisitions.load(Ordering::SeqCst)
    }
}

/// Proof of exclusive pipe access; dropping it releases the token.
#[derive(Debug)]
pub struct ExclusiveAccess {
    _guard: OwnedMutexGuard<()>,
    counters: Arc<Counters>,
}

impl Drop for ExclusiveAccess {
    fn drop(&mut self) {
        // Runs before the mutex guard field is dropped.
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
        trace!("Exclusivity token released");
    }
}
