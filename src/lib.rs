//! # claude-bridge
//!
//! 将 Claude Messages 流式协议桥接到仅支持文本的 OpenAI 兼容后端。
//!
//! Streaming bridge that lets Claude-style clients use tools against
//! OpenAI-compatible chat backends without native function calling.
//!
//! ## Overview
//!
//! A request flows through four stages:
//!
//! 1. **Translate**: the Claude request is flattened into an OpenAI chat request.
//! 2. **Inject**: when tools are present, a system prompt describing them and a
//!    per-request trigger signal is prepended.
//! 3. **Relay**: the upstream SSE body is decoded, parsed into text and tool
//!    calls, and re-encoded as Claude streaming events.
//! 4. **Account**: input tokens are estimated locally up front, output tokens
//!    while streaming, both scaled by the configured multiplier.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use claude_bridge::config::ProxyConfig;
//! use claude_bridge::pipeline::{relay, PlainTextParser};
//! use claude_bridge::stream::{ChannelSink, ClaudeStream, StreamContext};
//! use claude_bridge::transport::UpstreamClient;
//! use claude_bridge::types::ClaudeRequest;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> claude_bridge::Result<()> {
//!     let config = ProxyConfig::from_env()?;
//!     let request: ClaudeRequest = serde_json::from_str(r#"{"model":"m","messages":[]}"#)?;
//!
//!     let upstream_body = claude_bridge::translate::to_openai_request(&request, &config);
//!     let input = claude_bridge::tokens::estimate_input_tokens(&request, config.token_multiplier, "req-1");
//!
//!     let (sink, _frames) = ChannelSink::new(64);
//!     let context = StreamContext::from_config(&config, "req-1", input.input_tokens);
//!     let stream = ClaudeStream::new(context, Arc::new(sink));
//!     stream.start().await?;
//!
//!     let body = UpstreamClient::new(&config)?.send(&upstream_body, "req-1", None).await?;
//!     relay(body, &mut PlainTextParser, &stream, &CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Environment configuration and the token multiplier |
//! | [`types`] | Claude and OpenAI wire types, parser and stream events |
//! | [`translate`] | Claude request → OpenAI request |
//! | [`prompt`] | Tool catalogue rendering and prompt injection |
//! | [`tokens`] | Local input-token estimation |
//! | [`stream`] | Claude SSE encoder and text aggregation |
//! | [`pipeline`] | Upstream SSE decoding and the relay loop |
//! | [`transport`] | Upstream HTTP client |
//! | [`ids`] | Trigger signals, tool-use ids, request ids |
//! | [`telemetry`] | Structured logging setup |

pub mod config;
pub mod ids;
pub mod pipeline;
pub mod prompt;
pub mod stream;
pub mod telemetry;
pub mod tokens;
pub mod translate;
pub mod transport;
pub mod types;

pub use config::{ProxyConfig, TokenMultiplier};
pub use prompt::{inject_prompt, PromptInjection};
pub use stream::{ClaudeStream, SseSink, StreamContext};
pub use tokens::{estimate_input_tokens, TokenCountResult};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
