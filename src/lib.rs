//! tokencast - moving-window output token length prediction for LLM serving
//!
//! Given the input-token count of an incoming request, tokencast predicts
//! how many output tokens the request will generate, based on a sliding
//! window of completed-request traces. Predictions feed admission control,
//! batching, and cache-eviction decisions, so the predictor is updated
//! continuously and stays cheap under concurrency:
//!
//! - **Log-scale histogram**: observations live in `round(log2(n))`
//!   buckets over a two-dimensional (input-bucket x output-bucket) domain
//! - **Rotating history**: a fixed ring of per-interval slices with
//!   lock-free accounting retires expired observations
//! - **Wait-free hot paths**: ingest and prediction touch only atomics
//!   plus the read side of a rotation lock
//! - **Weighted random prediction** in O(output buckets)
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tokencast::OutputPredictor;
//!
//! // Bound token counts at 4096 over a ten-minute window
//! let predictor = OutputPredictor::new(4096, 4096, Duration::from_secs(600))?;
//!
//! // Feed every completed request
//! predictor.add_trace(128, 412, 1);
//!
//! // Estimate output length for an incoming request
//! let estimate = predictor.predict(128);
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod bucket;
pub mod config;
mod history;
pub mod predictor;
mod rotator;
mod slice;
pub mod stats;
mod summary;

// Re-exports for convenience
pub use config::{ColdStrategy, ConfigError, PredictorConfig, TokencastConfig};
pub use predictor::OutputPredictor;
pub use stats::{PredictorStats, StatsSnapshot};

/// Constants used throughout the library
pub mod constants {
    use std::time::Duration;

    /// Fixed rotation quantum separating history intervals
    pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(10);

    /// Default upper bound on input token counts
    pub const DEFAULT_MAX_INPUT_TOKENS: u32 = 4096;

    /// Default upper bound on output token counts
    pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

    /// Default observation horizon
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(600);
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::{ColdStrategy, ConfigError, PredictorConfig};
    pub use crate::predictor::OutputPredictor;
    pub use crate::stats::{PredictorStats, StatsSnapshot};
}
