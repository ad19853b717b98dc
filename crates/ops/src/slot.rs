//! Single-slot job guard.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::progress::ProgressTracker;

/// At most one bulk job per orchestrator.
#[derive(Debug, Default)]
pub struct JobSlot {
    busy: AtomicBool,
}

impl JobSlot {
    pub fn new() -> Self { Self::default() }

    pub fn is_busy(&self) -> bool { self.busy.load(Ordering::Acquire) }

    /// Take the slot, or `None` when a job already holds it. The returned guard
    /// frees the slot and resets `tracker` when dropped, whether the job finished
    /// or its future was dropped mid-flight.
    pub fn try_acquire<'a>(&'a self, tracker: &'a ProgressTracker) -> Option<SlotGuard<'a>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard { slot: self, tracker })
    }
}

#[derive(Debug)]
pub struct SlotGuard<'a> {
    slot: &'a JobSlot,
    tracker: &'a ProgressTracker,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.tracker.reset();
        self.slot.busy.store(false, Ordering::Release);
    }
}
