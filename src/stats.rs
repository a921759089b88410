//! Internal predictor statistics.
//!
//! Lightweight relaxed counters for observability and tests. These are
//! bookkeeping, not a metrics exporter; the serving layer around the
//! predictor decides what to publish.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the ingest, prediction, and rotation paths.
#[derive(Debug, Default)]
pub struct PredictorStats {
    /// Number of `add_trace` calls.
    pub traces: AtomicU64,
    /// Sum of trace counts (non-negative portion).
    pub observations: AtomicU64,
    /// Number of `predict` calls.
    pub predictions: AtomicU64,
    /// Predictions answered by the cold strategy.
    pub cold_predictions: AtomicU64,
    /// Completed rotations.
    pub rotations: AtomicU64,
    /// Empty intervals collapsed into skip slots across all rotations.
    pub collapsed_intervals: AtomicU64,
    /// Rotations aborted because the spare-slot invariant was violated.
    pub rotation_aborts: AtomicU64,
}

impl PredictorStats {
    /// Create zeroed stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one ingested trace.
    pub fn record_trace(&self, count: i32) {
        self.traces.fetch_add(1, Ordering::Relaxed);
        self.observations
            .fetch_add(count.max(0) as u64, Ordering::Relaxed);
    }

    /// Record a prediction, cold or warm.
    pub fn record_prediction(&self, cold: bool) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        if cold {
            self.cold_predictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a completed rotation that advanced `forwarded` intervals.
    pub fn record_rotation(&self, forwarded: i32) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
        self.collapsed_intervals
            .fetch_add((forwarded - 1).max(0) as u64, Ordering::Relaxed);
    }

    /// Record an aborted rotation.
    pub fn record_rotation_abort(&self) {
        self.rotation_aborts.fetch_add(1, Ordering::Relaxed);
    }

    /// Fraction of predictions answered cold.
    pub fn cold_rate(&self) -> f64 {
        let predictions = self.predictions.load(Ordering::Relaxed);
        if predictions == 0 {
            return 0.0;
        }
        self.cold_predictions.load(Ordering::Relaxed) as f64 / predictions as f64
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            traces: self.traces.load(Ordering::Relaxed),
            observations: self.observations.load(Ordering::Relaxed),
            predictions: self.predictions.load(Ordering::Relaxed),
            cold_predictions: self.cold_predictions.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            collapsed_intervals: self.collapsed_intervals.load(Ordering::Relaxed),
            rotation_aborts: self.rotation_aborts.load(Ordering::Relaxed),
        }
    }
}

/// Plain-value view of [`PredictorStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Number of `add_trace` calls.
    pub traces: u64,
    /// Sum of trace counts.
    pub observations: u64,
    /// Number of `predict` calls.
    pub predictions: u64,
    /// Predictions answered by the cold strategy.
    pub cold_predictions: u64,
    /// Completed rotations.
    pub rotations: u64,
    /// Empty intervals collapsed into skip slots.
    pub collapsed_intervals: u64,
    /// Aborted rotations.
    pub rotation_aborts: u64,
}
