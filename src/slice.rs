//! One interval's worth of observations.
//!
//! A slice is a dense row-major counter vector (one row per input bucket)
//! with a single trailing slot recording how many empty intervals were
//! collapsed into this ring position.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::summary::Summary;

/// Counter vector for a single rotation interval.
pub(crate) struct IntervalSlice {
    /// `input_buckets * output_buckets` cells plus the skip slot.
    cells: Box<[AtomicI32]>,
}

impl IntervalSlice {
    pub(crate) fn new(cell_count: usize) -> Self {
        Self {
            cells: (0..cell_count + 1).map(|_| AtomicI32::new(0)).collect(),
        }
    }

    pub(crate) fn add(&self, idx: usize, count: i32) {
        self.cells[idx].fetch_add(count, Ordering::AcqRel);
    }

    pub(crate) fn get(&self, idx: usize) -> i32 {
        self.cells[idx].load(Ordering::Acquire)
    }

    /// Retire this slice: subtract every cell from the summary, then zero
    /// it. The subtraction lands before the zeroing so a racing prediction
    /// never observes the summary under-counting a still-visible cell.
    /// Caller must hold the rotation writer lock.
    pub(crate) fn reset(&self, summary: &Summary) {
        let per_row = summary.output_buckets();
        let data = &self.cells[..self.cells.len() - 1];
        for (row, chunk) in data.chunks_exact(per_row).enumerate() {
            for (offset, cell) in chunk.iter().enumerate() {
                let observed = cell.load(Ordering::Acquire);
                summary.discard(row, row * per_row + offset, observed);
                cell.store(0, Ordering::Release);
            }
        }
        self.cells[self.cells.len() - 1].store(0, Ordering::Release);
    }

    /// Record how many empty intervals this ring position stands for.
    pub(crate) fn set_skipped(&self, skipped: i32) {
        self.cells[self.cells.len() - 1].store(skipped, Ordering::Release);
    }

    pub(crate) fn skipped(&self) -> i32 {
        self.cells[self.cells.len() - 1].load(Ordering::Acquire)
    }
}
