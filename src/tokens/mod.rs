//! Token 估算模块：输入 token 的本地估算与可替换的分词器。
//!
//! # Token Estimation Module
//!
//! Counts the textual surface of a Claude request (messages, system prompt,
//! tool schemas) so `message_start` can report `input_tokens` before the
//! upstream produces anything.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TokenCounter`] | Fallible counting interface |
//! | [`TiktokenCounter`] | BPE counting via `tiktoken-rs` |
//! | [`CharacterEstimator`] | `ceil(utf16_len / 4)` heuristic, the final fallback |
//! | [`EncoderFactory`] | Builds counters per model name |
//! | [`TokenizerRegistry`] | Process-wide LRU cache of counters with init/shutdown |
//! | [`estimate_input_tokens`] | Request-level estimate with multiplier applied |
//! | [`estimate_input_tokens_blocking`] | Same, on the blocking pool for async callers |
//!
//! ## Fallback chain
//!
//! | Step | Used when |
//! |------|-----------|
//! | Model encoder | `tiktoken-rs` knows the model |
//! | cl100k_base | Unknown model (every Claude model) |
//! | Character heuristic | No encoder could be built, or encoding failed |
//!
//! Output tokens are estimated separately and far more coarsely while
//! streaming, see [`crate::stream`].

mod counter;
mod estimator;
mod registry;

pub use counter::{
    utf16_len, CharacterEstimator, EncoderFactory, TiktokenCounter, TiktokenFactory,
    TokenCounter, TokenizerError,
};
pub use estimator::{
    count_tokens, estimate_input_tokens, estimate_input_tokens_blocking, estimate_input_tokens_with,
    extract_text_from_messages, TokenCountResult,
};
pub use registry::{get_token_counter, init, shared, shutdown, TokenizerRegistry};
