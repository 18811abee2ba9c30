//! Per-stream constants fixed when the stream is created.

use crate::config::{ProxyConfig, TokenMultiplier};
use std::time::Duration;

/// Model name reported in `message_start` when none is given.
pub const DEFAULT_STREAM_MODEL: &str = "claude-proxy";

/// Immutable per-stream record. Counters that change while streaming live
/// in the encoder, not here.
#[derive(Debug, Clone)]
pub struct StreamContext {
    pub request_id: String,
    pub model: String,
    pub input_tokens: u64,
    pub token_multiplier: TokenMultiplier,
    pub aggregation_interval: Duration,
}

impl StreamContext {
    pub fn new(request_id: impl Into<String>, input_tokens: u64) -> Self {
        Self {
            request_id: request_id.into(),
            model: DEFAULT_STREAM_MODEL.to_string(),
            input_tokens,
            token_multiplier: TokenMultiplier::IDENTITY,
            aggregation_interval: Duration::from_millis(crate::config::DEFAULT_AGGREGATION_INTERVAL_MS),
        }
    }

    /// Multiplier and aggregation interval taken from the proxy configuration.
    pub fn from_config(config: &ProxyConfig, request_id: impl Into<String>, input_tokens: u64) -> Self {
        Self::new(request_id, input_tokens)
            .with_multiplier(config.token_multiplier)
            .with_aggregation_interval(config.aggregation_interval)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_multiplier(mut self, multiplier: TokenMultiplier) -> Self {
        self.token_multiplier = multiplier;
        self
    }

    pub fn with_aggregation_interval(mut self, interval: Duration) -> Self {
        self.aggregation_interval = interval;
        self
    }
}
