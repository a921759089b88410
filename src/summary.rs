//! Running aggregate over all live interval slices.
//!
//! The summary mirrors the slice layout (dense row-major, one row per
//! input bucket) plus a per-row total, so predictions are answered in
//! O(output_buckets) without scanning history.

use std::sync::atomic::{AtomicI32, Ordering};

fn zeroed(len: usize) -> Box<[AtomicI32]> {
    (0..len).map(|_| AtomicI32::new(0)).collect()
}

/// Per-cell and per-row counters equal to the sum of the live slices.
pub(crate) struct Summary {
    cells: Box<[AtomicI32]>,
    row_sums: Box<[AtomicI32]>,
    output_buckets: usize,
}

impl Summary {
    pub(crate) fn new(input_buckets: usize, output_buckets: usize) -> Self {
        Self {
            cells: zeroed(input_buckets * output_buckets),
            row_sums: zeroed(input_buckets),
            output_buckets,
        }
    }

    /// Fold an observation in: cell first, row total second. A racing
    /// prediction that sees the row total grow is guaranteed to find the
    /// cell increment already in place.
    pub(crate) fn record(&self, row: usize, idx: usize, count: i32) {
        self.cells[idx].fetch_add(count, Ordering::AcqRel);
        self.row_sums[row].fetch_add(count, Ordering::AcqRel);
    }

    /// Fold a retiring slice cell out: row total first, cell second.
    pub(crate) fn discard(&self, row: usize, idx: usize, count: i32) {
        self.row_sums[row].fetch_sub(count, Ordering::AcqRel);
        self.cells[idx].fetch_sub(count, Ordering::AcqRel);
    }

    pub(crate) fn row_total(&self, row: usize) -> i32 {
        self.row_sums[row].load(Ordering::Acquire)
    }

    pub(crate) fn cell(&self, idx: usize) -> i32 {
        self.cells[idx].load(Ordering::Acquire)
    }

    pub(crate) fn output_buckets(&self) -> usize {
        self.output_buckets
    }

    pub(crate) fn cell_count(&self) -> usize {
        self.cells.len()
    }
}
