//! Single-flight guard for reconciliation passes.
//!
//! At most one pass runs at a time. A trigger that finds the guard held is
//! dropped, not queued. The flag is released by [`SyncPermit`]'s `Drop`, so
//! an error, a timeout, or a panic inside the pass cannot leave it set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct SyncGuard {
    running: Arc<AtomicBool>,
}

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard, or `None` if a pass is already running.
    pub fn try_acquire(&self) -> Option<SyncPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncPermit {
                running: Arc::clone(&self.running),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the running pass.
#[derive(Debug)]
#[must_use = "the guard is released as soon as the permit is dropped"]
pub struct SyncPermit {
    running: Arc<AtomicBool>,
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
