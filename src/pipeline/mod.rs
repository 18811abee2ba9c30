//! 流水线模块：上游字节流 → 解析器 → 流式编码器。
//!
//! # Relay Pipeline
//!
//! Connects an OpenAI-style SSE body to a [`ClaudeStream`](crate::stream::ClaudeStream).
//!
//! ```text
//! Raw Bytes → OpenAiSseDecoder → InvokeParser → ClaudeStream → SseSink
//!     │              │                 │               │
//!   HTTP       delta.content      ParserEvent     Claude SSE
//! ```
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`OpenAiSseDecoder`] | Incremental SSE framing into `OpenAIStreamChunk`s |
//! | [`InvokeParser`] | Model text → parser events |
//! | [`PlainTextParser`] | Pass-through parser for tool-less requests |
//! | [`relay`] | Sequential, cancellable driver |

pub mod decode;
mod parser;
mod relay;

pub use decode::OpenAiSseDecoder;
pub use parser::{InvokeParser, PlainTextParser};
pub use relay::{relay, RelayOutcome};
