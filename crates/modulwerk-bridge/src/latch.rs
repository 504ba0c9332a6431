// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// BusyLatch — drop work while a previous unit is still in flight.
//
// Used by providers that receive a stream of frames or samples and can only
// process one at a time: a new unit that arrives while the latch is held is
// counted and discarded instead of queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::trace;

#[derive(Debug)]
pub struct BusyLatch {
    label: String,
    busy: AtomicBool,
    dropped: AtomicU64,
}

impl BusyLatch {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            busy: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Take the latch, or count a drop and return `None` if it is held.
    pub fn try_acquire(&self) -> Option<LatchGuard<'_>> {
        self.acquire().then_some(LatchGuard { latch: self })
    }

    /// Like [`try_acquire`](Self::try_acquire), with a guard that can move
    /// to another thread.
    pub fn try_acquire_owned(self: &Arc<Self>) -> Option<OwnedLatchGuard> {
        self.acquire().then(|| OwnedLatchGuard {
            latch: Arc::clone(self),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Units discarded because the latch was held.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn acquire(&self) -> bool {
        let acquired = self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !acquired {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!(latch = %self.label, "busy, unit dropped");
        }
        acquired
    }

    fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Releases the latch on drop.
#[derive(Debug)]
pub struct LatchGuard<'a> {
    latch: &'a BusyLatch,
}

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        self.latch.release();
    }
}

/// Releases the latch on drop.
#[derive(Debug)]
pub struct OwnedLatchGuard {
    latch: Arc<BusyLatch>,
}

impl Drop for OwnedLatchGuard {
    fn drop(&mut self) {
        self.latch.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_unit_is_dropped_while_busy() {
        let latch = BusyLatch::new("frames");
        let guard = latch.try_acquire().unwrap();
        assert!(latch.try_acquire().is_none());
        assert_eq!(latch.dropped_count(), 1);
        drop(guard);
        assert!(!latch.is_busy());
        assert!(latch.try_acquire().is_some());
    }

    #[test]
    fn owned_guard_releases_on_another_thread() {
        let latch = Arc::new(BusyLatch::new("frames"));
        let guard = latch.try_acquire_owned().unwrap();
        std::thread::spawn(move || drop(guard)).join().unwrap();
        assert!(!latch.is_busy());
    }
}
