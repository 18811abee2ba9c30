//! 流式编码模块：将解析器事件转换为 Claude SSE 事件。
//!
//! # Stream Encoding Module
//!
//! Turns the parser's event sequence into a well-formed Claude streaming
//! response written to an [`SseSink`].
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ClaudeStream`] | Block state machine: start, text, tool_use, finish, fail |
//! | [`TextAggregator`] | Coalesces text fragments over a short window |
//! | [`StreamContext`] | Immutable per-stream settings |
//! | [`SseSink`] | Transport writer; [`ChannelSink`] and [`MemorySink`] ship here |
//!
//! ## Event order
//!
//! | Phase | Events |
//! |-------|--------|
//! | Start | `message_start` |
//! | Text | `content_block_start(text)`, `content_block_delta(text_delta)`* |
//! | Tool call | `content_block_stop` (open text), `content_block_start(tool_use)`, `content_block_delta(input_json_delta)`, `content_block_stop` |
//! | Finish | `content_block_stop` (open text), `message_delta`, `message_stop` |
//! | Failure | `content_block_stop` (open text), `error` |

mod aggregator;
mod context;
mod encoder;
mod sink;

pub use aggregator::{FlushTarget, TextAggregator};
pub use context::{StreamContext, DEFAULT_STREAM_MODEL};
pub use encoder::{estimate_output_tokens, ClaudeStream};
pub use sink::{ChannelSink, MemorySink, SseChunk, SseFrame, SseSink};
