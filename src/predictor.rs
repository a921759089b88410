//! Moving-histogram output length predictor.
//!
//! [`OutputPredictor`] collects a sliding-window histogram of completed
//! requests' output tokens, bucketed by input tokens, and answers
//! predictions by weighted random sampling over the input bucket's row.
//!
//! Usage:
//! 1. Build with the maximum input/output estimation and a window size.
//! 2. [`OutputPredictor::add_trace`] on every completed request. Output
//!    tokens are categorized under the input bucket `round(log2(input))`.
//! 3. [`OutputPredictor::predict`] to estimate output tokens for an
//!    incoming request by its input token count.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::RwLock;
use rand::Rng;

use crate::bucket;
use crate::config::{ColdStrategy, ConfigError, PredictorConfig};
use crate::history::RotatingHistory;
use crate::rotator::Rotator;
use crate::stats::PredictorStats;
use crate::summary::Summary;

/// Uniform draw from `[0, bound)`; `bound` is always positive.
type RandomSource = Box<dyn Fn(i32) -> i32 + Send + Sync>;

/// State shared between the predictor handle and the rotator thread.
pub(crate) struct PredictorShared {
    history: RotatingHistory,
    summary: Summary,
    input_buckets: usize,
    output_buckets: usize,
    max_output_tokens: u32,
    cold_strategy: ColdStrategy,
    /// Lock discipline is inverted on purpose: "readers" are the ingest
    /// calls mutating atomic counters, and the sole "writer" is the
    /// rotator moving cursors and zeroing cells.
    rotation_mu: RwLock<()>,
    rand: RandomSource,
    stats: PredictorStats,
}

impl PredictorShared {
    fn build(config: PredictorConfig, rand: RandomSource) -> Result<Self, ConfigError> {
        config.validate()?;

        let input_buckets = bucket::bucket_count(config.max_input_tokens);
        let output_buckets = bucket::bucket_count(config.max_output_tokens);

        // One slot beyond the window so rotation can install a fresh head
        // without touching a slot writers may still hold; a partial
        // trailing interval needs one more.
        let interval_nanos = config.interval.as_nanos();
        let mut slot_count = (config.window.as_nanos() / interval_nanos) as usize + 1;
        if config.window.as_nanos() % interval_nanos > 0 {
            slot_count += 1;
        }

        Ok(Self {
            history: RotatingHistory::new(
                slot_count,
                input_buckets * output_buckets,
                Instant::now(),
                config.interval,
            ),
            summary: Summary::new(input_buckets, output_buckets),
            input_buckets,
            output_buckets,
            max_output_tokens: config.max_output_tokens,
            cold_strategy: config.cold_strategy,
            rotation_mu: RwLock::new(()),
            rand,
            stats: PredictorStats::new(),
        })
    }

    fn ingest(&self, input_tokens: u32, output_tokens: u32, count: i32) {
        let row = bucket::token_to_bucket(input_tokens, self.input_buckets);
        let idx = row * self.output_buckets
            + bucket::token_to_bucket(output_tokens, self.output_buckets);

        let _guard = self.rotation_mu.read();

        // Summary first, head slice second: a concurrent prediction that
        // observes the summary increment must never find it smaller than
        // the live slices beneath it.
        self.summary.record(row, idx, count);
        self.history.head_slice().add(idx, count);
        self.stats.record_trace(count);
    }

    fn predict(&self, input_tokens: u32) -> u32 {
        let row = bucket::token_to_bucket(input_tokens, self.input_buckets);
        let total = self.summary.row_total(row);
        if total == 0 {
            self.stats.record_prediction(true);
            return self.cold_predict(input_tokens);
        }
        self.stats.record_prediction(false);

        // Weighted random: the row is a histogram over log-scale output
        // buckets, so the first bucket whose cumulative count exceeds the
        // cursor is a sample of the recent output distribution.
        let cursor = (self.rand)(total);
        let mut accumulated = 0i32;
        let base = row * self.output_buckets;
        for offset in 0..self.output_buckets {
            accumulated += self.summary.cell(base + offset);
            if cursor < accumulated {
                return bucket::bucket_tokens(offset);
            }
        }
        // A racing rotation can drain the row mid-walk; answer with the
        // top bucket rather than rescanning.
        bucket::bucket_tokens(self.output_buckets - 1)
    }

    fn cold_predict(&self, input_tokens: u32) -> u32 {
        match self.cold_strategy {
            ColdStrategy::Optimistic => 1,
            ColdStrategy::Random => {
                let bound = self.max_output_tokens.min(i32::MAX as u32) as i32;
                (self.rand)(bound) as u32 + 1
            }
            ColdStrategy::Input => input_tokens.max(1),
            ColdStrategy::Pessimistic => self.max_output_tokens,
        }
    }

    pub(crate) fn rotate(&self, ts: Instant) -> bool {
        let limit = self.history.live_limit();
        if self.history.size() > limit {
            self.stats.record_rotation_abort();
            tracing::error!(
                size = self.history.size(),
                limit,
                "no spare interval slot in output predictor history; rotation aborted"
            );
            return false;
        }

        let _guard = self.rotation_mu.write();

        let forwarded = self.history.forward_locked(ts);
        if forwarded == 0 {
            // Another rotation already advanced past ts.
            return true;
        }

        // Retire expired data. The head itself is never counted, so the
        // live size must stay below the limit.
        while self.history.size() >= limit {
            self.history.reset_tail(&self.summary);
        }

        self.stats.record_rotation(forwarded);
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(forwarded, live = self.history.size(), "history rotated");
        }
        true
    }
}

/// Online output-length predictor over a sliding observation window.
///
/// Safe for concurrent ingestion and prediction from many threads; a
/// background rotator retires expired intervals. Predictions are
/// power-of-two estimates at bucket resolution, not exact counts.
pub struct OutputPredictor {
    shared: Arc<PredictorShared>,
    rotator: Option<Rotator>,
}

impl OutputPredictor {
    /// Create a predictor with the default interval and cold strategy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for zero bounds or a zero
    /// window.
    pub fn new(
        max_input_tokens: u32,
        max_output_tokens: u32,
        window: std::time::Duration,
    ) -> Result<Self, ConfigError> {
        Self::from_config(PredictorConfig::new(
            max_input_tokens,
            max_output_tokens,
            window,
        ))
    }

    /// Create a predictor from a full configuration.
    pub fn from_config(config: PredictorConfig) -> Result<Self, ConfigError> {
        let rand: RandomSource = Box::new(|bound| rand::thread_rng().gen_range(0..bound));
        let shared = Arc::new(PredictorShared::build(config, rand)?);
        let rotator = Rotator::spawn(Arc::clone(&shared));
        Ok(Self {
            shared,
            rotator: Some(rotator),
        })
    }

    /// Testing constructor: the supplied function replaces the RNG
    /// (uniform draw from `[0, bound)`), and rotation runs inline on the
    /// ingest thread so every `add_trace_at` observes a fully rotated
    /// history. Time-series tests become deterministic.
    pub fn deterministic(
        config: PredictorConfig,
        rand: impl Fn(i32) -> i32 + Send + Sync + 'static,
    ) -> Result<Self, ConfigError> {
        let shared = Arc::new(PredictorShared::build(config, Box::new(rand))?);
        Ok(Self {
            shared,
            rotator: None,
        })
    }

    /// Record a completed request observed now.
    pub fn add_trace(&self, input_tokens: u32, output_tokens: u32, count: i32) {
        self.add_trace_at(input_tokens, output_tokens, count, Instant::now());
    }

    /// Record `count` completed requests with the given token counts at
    /// an explicit timestamp.
    ///
    /// Token counts beyond the configured maxima are clamped into the top
    /// bucket. The trace lands in the head slice active when it is
    /// applied; if a rotation races it, that may be a fresher head, never
    /// a retired slice.
    pub fn add_trace_at(&self, input_tokens: u32, output_tokens: u32, count: i32, ts: Instant) {
        if self.shared.history.is_stale(ts) {
            match &self.rotator {
                Some(rotator) => {
                    rotator.signal(ts);
                    // Give the rotator a chance to take the lock first.
                    thread::yield_now();
                }
                None => {
                    self.shared.rotate(ts);
                }
            }
        }

        self.shared.ingest(input_tokens, output_tokens, count);
    }

    /// Predict the output token count for a request with the given input
    /// token count.
    ///
    /// Draws from the input bucket's recent output distribution; if the
    /// bucket has no history, falls back to the configured
    /// [`ColdStrategy`].
    pub fn predict(&self, input_tokens: u32) -> u32 {
        self.shared.predict(input_tokens)
    }

    /// Number of live history slices, the head excluded. Collapsed empty
    /// intervals are counted. Exposed for tests and metrics.
    pub fn size(&self) -> i32 {
        self.shared.history.size()
    }

    /// Internal counters for the ingest, prediction, and rotation paths.
    pub fn stats(&self) -> &PredictorStats {
        &self.shared.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
    use std::time::Duration;

    fn config() -> PredictorConfig {
        PredictorConfig::new(1024, 1024, Duration::from_secs(60))
    }

    /// RNG returning cursors from a fixed script, repeating the last one.
    fn scripted(cursors: &[i32]) -> impl Fn(i32) -> i32 + Send + Sync + 'static {
        let cursors = cursors.to_vec();
        let next = AtomicUsize::new(0);
        move |_bound| {
            let i = next.fetch_add(1, Ordering::Relaxed).min(cursors.len() - 1);
            cursors[i]
        }
    }

    #[test]
    fn test_construction_rejects_invalid_config() {
        assert!(OutputPredictor::new(0, 1024, Duration::from_secs(60)).is_err());
        assert!(OutputPredictor::new(1024, 0, Duration::from_secs(60)).is_err());
        assert!(OutputPredictor::new(1024, 1024, Duration::ZERO).is_err());
    }

    #[test]
    fn test_cold_prediction_strategies() {
        let optimistic = OutputPredictor::deterministic(config(), scripted(&[0])).unwrap();
        assert_eq!(optimistic.predict(200), 1);

        let input = OutputPredictor::deterministic(
            config().with_cold_strategy(ColdStrategy::Input),
            scripted(&[0]),
        )
        .unwrap();
        assert_eq!(input.predict(200), 200);
        assert_eq!(input.predict(0), 1);

        let pessimistic = OutputPredictor::deterministic(
            config().with_cold_strategy(ColdStrategy::Pessimistic),
            scripted(&[0]),
        )
        .unwrap();
        assert_eq!(pessimistic.predict(200), 1024);

        // Random draws bound-1, so the cold answer is the maximum.
        let random = OutputPredictor::deterministic(
            config().with_cold_strategy(ColdStrategy::Random),
            |bound| bound - 1,
        )
        .unwrap();
        assert_eq!(random.predict(200), 1024);
    }

    #[test]
    fn test_single_observation_predicts_its_bucket() {
        let predictor = OutputPredictor::deterministic(config(), scripted(&[0])).unwrap();
        predictor.add_trace_at(200, 400, 1, Instant::now());
        // in=200 -> bucket 8; out=400 -> bucket 9 -> 2^9.
        assert_eq!(predictor.predict(200), 512);
    }

    #[test]
    fn test_weighted_sampling_follows_cursor() {
        let predictor = OutputPredictor::deterministic(config(), scripted(&[50, 99])).unwrap();
        let t0 = Instant::now();
        predictor.add_trace_at(50, 50, 99, t0);
        predictor.add_trace_at(50, 500, 1, t0);

        // Cursor 50 lands in the 99-count bucket (out=50 -> 2^6).
        assert_eq!(predictor.predict(50), 64);
        // Cursor 99 steps past it into the out=500 bucket (2^9).
        assert_eq!(predictor.predict(50), 512);
    }

    #[test]
    fn test_predict_falls_back_to_top_bucket_when_row_drains() {
        // An out-of-range cursor models a racing subtraction emptying the
        // row between the total load and the walk.
        let predictor = OutputPredictor::deterministic(config(), scripted(&[5])).unwrap();
        predictor.add_trace_at(50, 50, 1, Instant::now());
        assert_eq!(predictor.predict(50), 1024);
    }

    #[test]
    fn test_overflow_clamps_to_top_bucket() {
        let predictor = OutputPredictor::deterministic(config(), scripted(&[0])).unwrap();
        predictor.add_trace_at(1_000_000, 1_000_000, 1, Instant::now());
        let predicted = predictor.predict(1_000_000);
        assert_eq!(predicted, 1024);
        assert!(predicted <= 1024);
    }

    #[test]
    fn test_summary_matches_counts_within_one_interval() {
        let predictor = OutputPredictor::deterministic(config(), scripted(&[0])).unwrap();
        let t0 = Instant::now();
        predictor.add_trace_at(100, 100, 5, t0);
        predictor.add_trace_at(100, 900, 2, t0);
        predictor.add_trace_at(700, 100, 3, t0);

        let shared = &predictor.shared;
        let row_100 = bucket::token_to_bucket(100, shared.input_buckets);
        let row_700 = bucket::token_to_bucket(700, shared.input_buckets);

        // Row sums equal both the cell sums and the ingested counts.
        for row in 0..shared.input_buckets {
            let cells: i32 = (0..shared.output_buckets)
                .map(|j| shared.summary.cell(row * shared.output_buckets + j))
                .sum();
            assert_eq!(shared.summary.row_total(row), cells);
        }
        assert_eq!(shared.summary.row_total(row_100), 7);
        assert_eq!(shared.summary.row_total(row_700), 3);
        assert_eq!(predictor.stats().snapshot().observations, 10);
    }

    #[test]
    fn test_summary_equals_live_slices_across_rotations() {
        let predictor = OutputPredictor::deterministic(config(), scripted(&[0])).unwrap();
        let t0 = Instant::now();
        predictor.add_trace_at(10, 10, 4, t0);
        predictor.add_trace_at(300, 600, 2, t0 + Duration::from_secs(12));
        predictor.add_trace_at(300, 600, 1, t0 + Duration::from_secs(41));

        let shared = &predictor.shared;
        for idx in 0..shared.summary.cell_count() {
            let across_slices: i32 = shared
                .history
                .slots()
                .iter()
                .map(|slice| slice.get(idx))
                .sum();
            assert_eq!(shared.summary.cell(idx), across_slices);
        }
    }

    #[test]
    fn test_expiry_drains_summary_and_size() {
        let predictor = OutputPredictor::deterministic(config(), scripted(&[0])).unwrap();
        let t0 = Instant::now();
        predictor.add_trace_at(100, 100, 5, t0);

        predictor.shared.rotate(t0 + Duration::from_secs(80));

        assert_eq!(predictor.size(), 0);
        let shared = &predictor.shared;
        for idx in 0..shared.summary.cell_count() {
            assert_eq!(shared.summary.cell(idx), 0);
        }
        for row in 0..shared.input_buckets {
            assert_eq!(shared.summary.row_total(row), 0);
        }
        // All history expired, so the prediction goes cold.
        assert_eq!(predictor.predict(100), 1);
        assert_eq!(predictor.stats().snapshot().cold_predictions, 1);
    }

    #[test]
    fn test_rotation_is_idempotent_per_timestamp() {
        let predictor = OutputPredictor::deterministic(config(), scripted(&[0])).unwrap();
        let t0 = Instant::now();
        predictor.add_trace_at(100, 100, 5, t0);

        let ts = t0 + Duration::from_secs(25);
        assert!(predictor.shared.rotate(ts));
        let size_after_first = predictor.size();
        let total_after_first = predictor.shared.summary.row_total(7);

        assert!(predictor.shared.rotate(ts));
        assert_eq!(predictor.size(), size_after_first);
        assert_eq!(predictor.shared.summary.row_total(7), total_after_first);
        assert_eq!(predictor.stats().snapshot().rotations, 1);
    }

    #[test]
    fn test_sparse_traffic_collapses_empty_intervals() {
        let predictor = OutputPredictor::deterministic(config(), scripted(&[0])).unwrap();
        let t0 = Instant::now();
        predictor.add_trace_at(1, 1, 1, t0);
        predictor.add_trace_at(1, 1, 1, t0 + Duration::from_secs(35));

        // Three empty intervals collapsed into one ring position.
        assert_eq!(predictor.size(), 3);
        assert!(predictor.size() <= 4);
        assert_eq!(predictor.shared.summary.row_total(0), 2);

        // At t=65 the t=0 trace has aged out; the t=35 one remains.
        predictor.shared.rotate(t0 + Duration::from_secs(65));
        assert_eq!(predictor.shared.summary.row_total(0), 1);

        // By t=95 the t=35 trace's horizon has elapsed as well.
        predictor.shared.rotate(t0 + Duration::from_secs(95));
        assert_eq!(predictor.shared.summary.row_total(0), 0);
        assert_eq!(predictor.predict(1), 1);
    }

    #[test]
    fn test_prediction_always_positive_and_bounded() {
        let predictor = OutputPredictor::deterministic(config(), scripted(&[0])).unwrap();
        let t0 = Instant::now();
        for tokens in [0u32, 1, 17, 300, 5000] {
            predictor.add_trace_at(tokens, tokens, 1, t0);
        }
        for tokens in [0u32, 1, 17, 300, 5000, 1_000_000] {
            let predicted = predictor.predict(tokens);
            assert!(predicted >= 1);
            assert!(predicted <= 1024);
        }
    }

    #[test]
    fn test_bound_passed_to_rng_is_row_total() {
        let seen = Arc::new(AtomicI32::new(-1));
        let sink = Arc::clone(&seen);
        let predictor = OutputPredictor::deterministic(config(), move |bound| {
            sink.store(bound, Ordering::SeqCst);
            0
        })
        .unwrap();

        predictor.add_trace_at(200, 400, 6, Instant::now());
        predictor.predict(200);
        assert_eq!(seen.load(Ordering::SeqCst), 6);
    }
}
