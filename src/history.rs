//! Sliding-window ring of interval slices.
//!
//! The ring always keeps one spare slot ahead of the head so a rotation
//! can install a fresh head without contending with writers on the slot
//! being retired. Sparse traffic is handled by collapsing runs of empty
//! intervals into the incoming head's skip slot rather than spending ring
//! positions on them.

use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::slice::IntervalSlice;
use crate::summary::Summary;

/// Fixed-capacity ring of [`IntervalSlice`] with head/tail cursors.
///
/// Cursors and the head timestamp are only mutated under the predictor's
/// rotation writer lock, but they are read from unlocked probe paths, so
/// all of them live in atomics. The head timestamp is kept as a
/// nanosecond offset from a fixed construction-time origin.
pub(crate) struct RotatingHistory {
    slots: Box<[IntervalSlice]>,
    head: AtomicUsize,
    tail: AtomicUsize,
    head_offset_nanos: AtomicU64,
    origin: Instant,
    interval_nanos: u64,
    /// Live slice count, head excluded. Can exceed the number of occupied
    /// ring positions because collapsed empty intervals count too.
    live: AtomicI32,
}

impl RotatingHistory {
    pub(crate) fn new(
        slot_count: usize,
        cell_count: usize,
        origin: Instant,
        interval: Duration,
    ) -> Self {
        Self {
            slots: (0..slot_count)
                .map(|_| IntervalSlice::new(cell_count))
                .collect(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            head_offset_nanos: AtomicU64::new(0),
            origin,
            interval_nanos: interval.as_nanos() as u64,
            live: AtomicI32::new(0),
        }
    }

    pub(crate) fn head_slice(&self) -> &IntervalSlice {
        &self.slots[self.head.load(Ordering::Acquire)]
    }

    pub(crate) fn size(&self) -> i32 {
        self.live.load(Ordering::Acquire)
    }

    /// Maximum live size: every slot except the spare.
    pub(crate) fn live_limit(&self) -> i32 {
        (self.slots.len() - 1) as i32
    }

    fn offset_nanos(&self, ts: Instant) -> u64 {
        ts.saturating_duration_since(self.origin).as_nanos() as u64
    }

    /// Unlocked probe: has at least one full interval elapsed since the
    /// head timestamp?
    pub(crate) fn is_stale(&self, ts: Instant) -> bool {
        let head = self.head_offset_nanos.load(Ordering::Acquire);
        self.offset_nanos(ts).saturating_sub(head) >= self.interval_nanos
    }

    /// Advance the head into the spare slot. Returns the number of whole
    /// intervals that elapsed (0 if the head is still current), all of
    /// which are accounted to the new head's skip slot; only one ring
    /// position is consumed regardless. Caller must hold the rotation
    /// writer lock; the incoming slot is already zeroed by `reset_tail`.
    pub(crate) fn forward_locked(&self, ts: Instant) -> i32 {
        let head_offset = self.head_offset_nanos.load(Ordering::Acquire);
        let elapsed = self.offset_nanos(ts).saturating_sub(head_offset);
        if elapsed < self.interval_nanos {
            return 0;
        }

        let forwarded = (elapsed / self.interval_nanos) as i32;
        let next = (self.head.load(Ordering::Acquire) + 1) % self.slots.len();
        self.head.store(next, Ordering::Release);
        self.head_offset_nanos.store(
            head_offset + forwarded as u64 * self.interval_nanos,
            Ordering::Release,
        );
        self.slots[next].set_skipped(forwarded);
        self.live.fetch_add(forwarded, Ordering::AcqRel);
        forwarded
    }

    /// Retire the tail slice: drain it out of the summary, advance the
    /// tail cursor, and pop the empty intervals collapsed into the new
    /// tail. Caller must hold the rotation writer lock.
    pub(crate) fn reset_tail(&self, summary: &Summary) {
        let tail = self.tail.load(Ordering::Acquire);
        self.slots[tail].reset(summary);
        let next = (tail + 1) % self.slots.len();
        self.tail.store(next, Ordering::Release);
        self.live
            .fetch_sub(self.slots[next].skipped(), Ordering::AcqRel);
    }

    #[cfg(test)]
    pub(crate) fn slots(&self) -> &[IntervalSlice] {
        &self.slots
    }
}
