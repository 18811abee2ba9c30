//! Parser events in, Claude SSE events out.
//!
//! Block discipline: at most one text block is open at a time, a tool-use
//! block is only emitted after any open text block is closed, and block
//! indices start at 0 and grow by one per block. `message_start` precedes
//! every block event and `message_stop` is sent at most once.

use super::aggregator::{FlushTarget, TextAggregator};
use super::context::StreamContext;
use super::sink::{SseFrame, SseSink};
use crate::ids::{IdGenerator, RandomIdGenerator};
use crate::types::events::{
    ContentBlockStart, ContentDelta, ErrorBody, MessageDeltaBody, MessageStart, OutputUsage, Usage,
};
use crate::types::{ClaudeStreamEvent, ParsedInvokeCall, ParserEvent};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Output tokens charged per UTF-16 unit of emitted text.
const OUTPUT_TOKENS_PER_UNIT: f64 = 0.25;

/// Mutable block bookkeeping. Only touched under the encoder's state lock.
#[derive(Debug, Default)]
struct StreamState {
    started: bool,
    finished: bool,
    next_block_index: u32,
    /// Index of the open text block.
    open_text_block: Option<u32>,
    tool_blocks: u32,
    output_tokens: u64,
}

impl StreamState {
    fn allocate_index(&mut self) -> u32 {
        let index = self.next_block_index;
        self.next_block_index += 1;
        index
    }
}

struct EncoderCore {
    context: StreamContext,
    sink: Arc<dyn SseSink>,
    ids: Arc<dyn IdGenerator>,
    state: Mutex<StreamState>,
    abandoned: AtomicBool,
}

impl EncoderCore {
    fn is_closed(&self, state: &StreamState) -> bool {
        state.finished || self.abandoned.load(Ordering::Acquire)
    }

    async fn emit(&self, event: ClaudeStreamEvent) -> Result<()> {
        let flush = !event.is_text_delta();
        let frame = SseFrame::from_event(&event)?;
        self.sink.send(frame, flush).await
    }

    async fn ensure_started(&self, state: &mut StreamState) -> Result<()> {
        if state.started {
            return Ok(());
        }
        state.started = true;
        let message = MessageStart {
            id: format!("msg_{}", self.context.request_id),
            kind: "message".to_string(),
            role: "assistant".to_string(),
            model: self.context.model.clone(),
            content: Vec::new(),
            stop_reason: None,
            stop_sequence: None,
            usage: Usage {
                input_tokens: self.context.input_tokens,
                output_tokens: 0,
            },
        };
        self.emit(ClaudeStreamEvent::MessageStart { message }).await
    }

    async fn ensure_text_block(&self, state: &mut StreamState) -> Result<u32> {
        if let Some(index) = state.open_text_block {
            return Ok(index);
        }
        let index = state.allocate_index();
        state.open_text_block = Some(index);
        self.emit(ClaudeStreamEvent::ContentBlockStart {
            index,
            content_block: ContentBlockStart::Text {
                text: String::new(),
            },
        })
        .await?;
        Ok(index)
    }

    async fn end_text_block(&self, state: &mut StreamState) -> Result<()> {
        match state.open_text_block.take() {
            Some(index) => self.emit(ClaudeStreamEvent::ContentBlockStop { index }).await,
            None => Ok(()),
        }
    }

    async fn emit_tool_call(&self, call: &ParsedInvokeCall) -> Result<()> {
        if call.name.trim().is_empty() {
            return Err(Error::encoding_with_context(
                "tool call without a name",
                ErrorContext::new()
                    .with_field_path("tool_call.name")
                    .with_details(call.arguments.to_string()),
            ));
        }
        let arguments = match &call.arguments {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        let partial_json = serde_json::to_string(&arguments)?;

        let mut state = self.state.lock().await;
        if self.is_closed(&state) {
            return Ok(());
        }
        self.ensure_started(&mut state).await?;
        self.end_text_block(&mut state).await?;

        let index = state.allocate_index();
        state.tool_blocks += 1;
        let id = self.ids.tool_use_id();
        debug!(
            request_id = self.context.request_id.as_str(),
            index,
            tool = call.name.as_str(),
            tool_use_id = id.as_str(),
            "emitting tool_use block"
        );
        self.emit(ClaudeStreamEvent::ContentBlockStart {
            index,
            content_block: ContentBlockStart::ToolUse {
                id,
                name: call.name.clone(),
                input: Value::Object(Default::default()),
            },
        })
        .await?;
        self.emit(ClaudeStreamEvent::ContentBlockDelta {
            index,
            delta: ContentDelta::InputJsonDelta { partial_json },
        })
        .await?;
        self.emit(ClaudeStreamEvent::ContentBlockStop { index }).await
    }
}

#[async_trait]
impl FlushTarget for EncoderCore {
    async fn flush_text(&self, text: String) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        if self.is_closed(&state) {
            return Ok(());
        }
        self.ensure_started(&mut state).await?;
        let index = self.ensure_text_block(&mut state).await?;
        state.output_tokens += estimate_output_tokens(&text);
        self.emit(ClaudeStreamEvent::ContentBlockDelta {
            index,
            delta: ContentDelta::TextDelta { text },
        })
        .await
    }
}

/// `ceil(utf16_len × 0.25)`, the running output estimate per flushed text.
pub fn estimate_output_tokens(text: &str) -> u64 {
    (crate::tokens::utf16_len(text) as f64 * OUTPUT_TOKENS_PER_UNIT).ceil() as u64
}

/// Streaming encoder for one response.
///
/// Feed it [`ParserEvent`]s in arrival order; it writes Claude SSE frames to
/// the sink. Text is coalesced through a [`TextAggregator`] using the
/// context's interval.
pub struct ClaudeStream {
    core: Arc<EncoderCore>,
    aggregator: TextAggregator,
}

impl ClaudeStream {
    pub fn new(context: StreamContext, sink: Arc<dyn SseSink>) -> Self {
        Self::with_id_generator(context, sink, Arc::new(RandomIdGenerator))
    }

    pub fn with_id_generator(
        context: StreamContext,
        sink: Arc<dyn SseSink>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let interval = context.aggregation_interval;
        let core = Arc::new(EncoderCore {
            context,
            sink,
            ids,
            state: Mutex::new(StreamState::default()),
            abandoned: AtomicBool::new(false),
        });
        let aggregator = TextAggregator::new(interval, core.clone());
        Self { core, aggregator }
    }

    pub fn context(&self) -> &StreamContext {
        &self.core.context
    }

    /// Emits `message_start` with the pre-computed input token count. Later
    /// calls are no-ops.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.core.state.lock().await;
        if self.core.is_closed(&state) {
            return Ok(());
        }
        self.core.ensure_started(&mut state).await
    }

    /// Applies one parser event. Events after termination are ignored.
    ///
    /// A malformed tool call terminates the stream with an `error` event and
    /// returns the encoding error.
    pub async fn handle_event(&self, event: ParserEvent) -> Result<()> {
        if self.is_finished().await {
            debug!(
                request_id = self.core.context.request_id.as_str(),
                "event after stream end ignored"
            );
            return Ok(());
        }
        match event {
            ParserEvent::Text { content } => {
                self.start().await?;
                self.aggregator.add(&content).await
            }
            ParserEvent::ToolCall { call } => {
                self.aggregator.flush().await?;
                match self.core.emit_tool_call(&call).await {
                    Err(e @ Error::Encoding { .. }) => {
                        self.fail(&e).await?;
                        Err(e)
                    }
                    other => other,
                }
            }
            ParserEvent::End => self.finish().await,
        }
    }

    pub async fn handle_events<I>(&self, events: I) -> Result<()>
    where
        I: IntoIterator<Item = ParserEvent>,
    {
        for event in events {
            self.handle_event(event).await?;
        }
        Ok(())
    }

    /// Flushes pending text, closes the open text block and emits
    /// `message_delta` then `message_stop`. Idempotent.
    pub async fn finish(&self) -> Result<()> {
        if self.is_finished().await {
            return Ok(());
        }
        self.aggregator.flush().await?;

        let mut state = self.core.state.lock().await;
        if self.core.is_closed(&state) {
            return Ok(());
        }
        state.finished = true;
        self.core.ensure_started(&mut state).await?;
        self.core.end_text_block(&mut state).await?;

        let output_tokens = self
            .core
            .context
            .token_multiplier
            .apply(state.output_tokens)
            .max(1);
        let stop_reason = if state.tool_blocks > 0 {
            "tool_use"
        } else {
            "end_turn"
        };
        debug!(
            request_id = self.core.context.request_id.as_str(),
            blocks = state.next_block_index,
            raw_output_tokens = state.output_tokens,
            output_tokens,
            stop_reason,
            "finishing stream"
        );
        self.core
            .emit(ClaudeStreamEvent::MessageDelta {
                delta: MessageDeltaBody {
                    stop_reason: Some(stop_reason.to_string()),
                    stop_sequence: None,
                },
                usage: OutputUsage { output_tokens },
            })
            .await?;
        self.core.emit(ClaudeStreamEvent::MessageStop).await
    }

    /// Terminates the stream with an `error` event instead of
    /// `message_stop`. Buffered text is delivered first when possible.
    pub async fn fail(&self, error: &Error) -> Result<()> {
        if self.is_finished().await {
            return Ok(());
        }
        if let Err(e) = self.aggregator.flush().await {
            warn!(error = %e, "dropping buffered text while failing stream");
            self.aggregator.cancel();
        }

        let mut state = self.core.state.lock().await;
        if self.core.is_closed(&state) {
            return Ok(());
        }
        state.finished = true;
        warn!(
            request_id = self.core.context.request_id.as_str(),
            error_type = error.error_type(),
            error = %error,
            "stream terminated with error"
        );
        self.core.end_text_block(&mut state).await?;
        self.core
            .emit(ClaudeStreamEvent::Error {
                error: ErrorBody {
                    kind: error.error_type().to_string(),
                    message: error.to_string(),
                },
            })
            .await
    }

    /// Stops processing after cancellation. Nothing further is written,
    /// including text a timer flush has not yet delivered.
    pub fn abandon(&self) {
        self.core.abandoned.store(true, Ordering::Release);
        self.aggregator.cancel();
        debug!(
            request_id = self.core.context.request_id.as_str(),
            "stream abandoned"
        );
    }

    pub async fn is_finished(&self) -> bool {
        let state = self.core.state.lock().await;
        self.core.is_closed(&state)
    }

    /// Raw output estimate before the multiplier.
    pub async fn output_tokens(&self) -> u64 {
        self.core.state.lock().await.output_tokens
    }
}
