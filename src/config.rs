//! Configuration types and loading helpers.

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{
    DEFAULT_MAX_INPUT_TOKENS, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_ROTATION_INTERVAL, DEFAULT_WINDOW,
};

/// Errors returned by configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error while reading config files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parse error.
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Invalid value for a key.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Raw value string.
        value: String,
    },
    /// Unknown configuration key.
    #[error("unknown config key: {0}")]
    UnknownKey(String),
}

/// Strategy used when an input bucket has no history yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColdStrategy {
    /// Predict the minimum output of 1. Profile-friendly: most serving
    /// profiles behave best when unknown requests are assumed short.
    #[default]
    Optimistic,
    /// Predict uniformly at random in `[1, max_output_tokens]`.
    Random,
    /// Predict the output to match the input length.
    Input,
    /// Predict the maximum, `max_output_tokens`.
    Pessimistic,
}

impl FromStr for ColdStrategy {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "optimistic" => Ok(ColdStrategy::Optimistic),
            "random" => Ok(ColdStrategy::Random),
            "input" => Ok(ColdStrategy::Input),
            "pessimistic" => Ok(ColdStrategy::Pessimistic),
            _ => Err(()),
        }
    }
}

/// Construction parameters for an
/// [`OutputPredictor`](crate::OutputPredictor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictorConfig {
    /// Upper bound on input token counts, used to size input buckets.
    pub max_input_tokens: u32,
    /// Upper bound on output token counts, used to size output buckets.
    pub max_output_tokens: u32,
    /// Total horizon over which observations remain live.
    pub window: Duration,
    /// Rotation quantum.
    pub interval: Duration,
    /// Behavior for input buckets with no history.
    pub cold_strategy: ColdStrategy,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            window: DEFAULT_WINDOW,
            interval: DEFAULT_ROTATION_INTERVAL,
            cold_strategy: ColdStrategy::default(),
        }
    }
}

impl PredictorConfig {
    /// Create a configuration with the default interval and cold strategy.
    pub fn new(max_input_tokens: u32, max_output_tokens: u32, window: Duration) -> Self {
        Self {
            max_input_tokens,
            max_output_tokens,
            window,
            ..Self::default()
        }
    }

    /// Set the rotation quantum.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the cold-prediction strategy.
    pub fn with_cold_strategy(mut self, strategy: ColdStrategy) -> Self {
        self.cold_strategy = strategy;
        self
    }

    /// Reject zero-sized bounds and zero durations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, value: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        if self.max_input_tokens == 0 {
            return Err(invalid("predictor.max_input_tokens", "0"));
        }
        if self.max_output_tokens == 0 {
            return Err(invalid("predictor.max_output_tokens", "0"));
        }
        if self.window.is_zero() {
            return Err(invalid("predictor.window_secs", "0"));
        }
        if self.interval.is_zero() {
            return Err(invalid("predictor.interval_secs", "0"));
        }
        Ok(())
    }
}

/// Top-level configuration schema.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokencastConfig {
    /// Predictor configuration.
    pub predictor: Option<PredictorSpec>,
}

impl TokencastConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load configuration from the `TOKENCAST_CONFIG` env var (if set),
    /// then apply `TOKENCAST__predictor__field` overrides.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let config_path = env::var("TOKENCAST_CONFIG").ok();
        let mut config = match config_path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment overrides in-place.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        for (key, value) in env::vars() {
            if !key.starts_with("TOKENCAST__") {
                continue;
            }
            let path = key["TOKENCAST__".len()..].to_ascii_lowercase();
            let parts: Vec<&str> = path.split("__").collect();
            let value = value.trim().to_string();

            match parts.as_slice() {
                ["predictor", "max_input_tokens"] => {
                    self.predictor_mut().max_input_tokens = Some(parse_value(&key, &value)?);
                }
                ["predictor", "max_output_tokens"] => {
                    self.predictor_mut().max_output_tokens = Some(parse_value(&key, &value)?);
                }
                ["predictor", "window_secs"] => {
                    self.predictor_mut().window_secs = Some(parse_value(&key, &value)?);
                }
                ["predictor", "interval_secs"] => {
                    self.predictor_mut().interval_secs = Some(parse_value(&key, &value)?);
                }
                ["predictor", "cold_strategy"] => {
                    self.predictor_mut().cold_strategy = Some(parse_value(&key, &value)?);
                }
                _ => return Err(ConfigError::UnknownKey(key)),
            }
        }

        Ok(())
    }

    /// Build a `PredictorConfig` using defaults plus overrides.
    pub fn to_predictor_config(&self) -> PredictorConfig {
        let mut config = PredictorConfig::default();
        if let Some(predictor) = &self.predictor {
            predictor.apply_to(&mut config);
        }
        config
    }

    fn predictor_mut(&mut self) -> &mut PredictorSpec {
        if self.predictor.is_none() {
            self.predictor = Some(PredictorSpec::default());
        }
        self.predictor.as_mut().expect("predictor config")
    }
}

/// Predictor configuration overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictorSpec {
    /// Upper bound on input token counts.
    pub max_input_tokens: Option<u32>,
    /// Upper bound on output token counts.
    pub max_output_tokens: Option<u32>,
    /// Observation horizon in seconds.
    pub window_secs: Option<u64>,
    /// Rotation quantum in seconds.
    pub interval_secs: Option<u64>,
    /// Cold-prediction strategy.
    pub cold_strategy: Option<ColdStrategy>,
}

impl PredictorSpec {
    fn apply_to(&self, config: &mut PredictorConfig) {
        if let Some(value) = self.max_input_tokens {
            config.max_input_tokens = value;
        }
        if let Some(value) = self.max_output_tokens {
            config.max_output_tokens = value;
        }
        if let Some(value) = self.window_secs {
            config.window = Duration::from_secs(value);
        }
        if let Some(value) = self.interval_secs {
            config.interval = Duration::from_secs(value);
        }
        if let Some(value) = self.cold_strategy {
            config.cold_strategy = value;
        }
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
