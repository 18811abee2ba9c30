//! Token counter implementations.

use std::sync::Arc;
use tiktoken_rs::CoreBPE;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenizerError {
    #[error("no tokenizer for model '{0}'")]
    UnknownModel(String),

    #[error("tokenizer unavailable: {0}")]
    Unavailable(String),

    #[error("encoding failed: {0}")]
    Encoding(String),
}

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> Result<usize, TokenizerError>;
}

/// UTF-16 code units, the length unit the heuristic is calibrated on.
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// `ceil(len / chars_per_token)`; the last-resort estimate, never fails.
#[derive(Debug, Clone)]
pub struct CharacterEstimator {
    chars_per_token: f64,
}

impl CharacterEstimator {
    pub fn new() -> Self {
        Self::with_ratio(4.0)
    }

    pub fn with_ratio(r: f64) -> Self {
        Self { chars_per_token: r }
    }

    pub fn estimate(&self, text: &str) -> usize {
        (utf16_len(text) as f64 / self.chars_per_token).ceil() as usize
    }
}

impl Default for CharacterEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for CharacterEstimator {
    fn count(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(self.estimate(text))
    }
}

/// BPE counter backed by `tiktoken-rs`.
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    pub fn new(bpe: CoreBPE) -> Self {
        Self { bpe }
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(self.bpe.encode_with_special_tokens(text).len())
    }
}

/// Builds counters per model name. Swapped out in tests.
pub trait EncoderFactory: Send + Sync {
    fn for_model(&self, model: &str) -> Result<Arc<dyn TokenCounter>, TokenizerError>;

    /// cl100k-equivalent encoder used when a model is unknown.
    fn default_encoder(&self) -> Result<Arc<dyn TokenCounter>, TokenizerError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TiktokenFactory;

impl EncoderFactory for TiktokenFactory {
    fn for_model(&self, model: &str) -> Result<Arc<dyn TokenCounter>, TokenizerError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|_| TokenizerError::UnknownModel(model.to_string()))?;
        Ok(Arc::new(TiktokenCounter::new(bpe)))
    }

    fn default_encoder(&self) -> Result<Arc<dyn TokenCounter>, TokenizerError> {
        let bpe =
            tiktoken_rs::cl100k_base().map_err(|e| TokenizerError::Unavailable(e.to_string()))?;
        Ok(Arc::new(TiktokenCounter::new(bpe)))
    }
}
