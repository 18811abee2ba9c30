//! Upstream bytes → parser → encoder, one step at a time.

use super::decode::OpenAiSseDecoder;
use super::parser::InvokeParser;
use crate::stream::ClaudeStream;
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a relay ended.
#[derive(Debug)]
pub enum RelayOutcome {
    /// Upstream finished and the stream was terminated with `message_stop`.
    Completed,
    /// The token fired; nothing further was written.
    Cancelled,
    /// The stream was terminated with an `error` event.
    Failed(Error),
}

impl RelayOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RelayOutcome::Completed)
    }
}

enum Interrupt {
    /// Upstream body failed; the client can still be told.
    Upstream(Error),
    /// Writing to the client failed or the encoder rejected an event.
    Encoder(Error),
}

/// Relays an upstream SSE body to `stream`.
///
/// Steps run strictly in order: each decoded fragment is parsed and its
/// events fully written before the next fragment is read. Cancellation
/// drops whatever step is in flight.
///
/// Returns `Err` only when the client sink itself failed, in which case no
/// terminating event could be delivered.
pub async fn relay<P>(
    upstream: BoxStream<'static, Bytes>,
    parser: &mut P,
    stream: &ClaudeStream,
    cancel: &CancellationToken,
) -> Result<RelayOutcome>
where
    P: InvokeParser + ?Sized,
{
    let request_id = stream.context().request_id.clone();
    let mut texts = OpenAiSseDecoder::new().text_deltas(upstream);
    let mut fragments = 0usize;

    loop {
        let step = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            step = advance(&mut texts, &mut *parser, stream) => Some(step),
        };

        match step {
            None => {
                stream.abandon();
                info!(request_id = request_id.as_str(), fragments, "relay cancelled");
                return Ok(RelayOutcome::Cancelled);
            }
            Some(Ok(true)) => fragments += 1,
            Some(Ok(false)) => {
                debug!(request_id = request_id.as_str(), fragments, "relay completed");
                return Ok(RelayOutcome::Completed);
            }
            Some(Err(Interrupt::Upstream(e))) => {
                warn!(request_id = request_id.as_str(), error = %e, "upstream stream failed");
                return match stream.fail(&e).await {
                    Ok(()) => Ok(RelayOutcome::Failed(e)),
                    Err(sink) => {
                        stream.abandon();
                        Err(sink)
                    }
                };
            }
            Some(Err(Interrupt::Encoder(e))) => {
                return match e {
                    // Already reported through an `error` event.
                    Error::Encoding { .. } => Ok(RelayOutcome::Failed(e)),
                    other => {
                        warn!(request_id = request_id.as_str(), error = %other, "client stream failed");
                        stream.abandon();
                        Err(other)
                    }
                };
            }
        }
    }
}

/// `Ok(true)` after a fragment, `Ok(false)` once the stream is finished.
async fn advance<P>(
    texts: &mut BoxStream<'static, String>,
    parser: &mut P,
    stream: &ClaudeStream,
) -> std::result::Result<bool, Interrupt>
where
    P: InvokeParser + ?Sized,
{
    match texts.next().await {
        Some(Ok(text)) => {
            stream
                .handle_events(parser.feed(&text))
                .await
                .map_err(Interrupt::Encoder)?;
            Ok(true)
        }
        Some(Err(e)) => Err(Interrupt::Upstream(e)),
        None => {
            stream
                .handle_events(parser.finish())
                .await
                .map_err(Interrupt::Encoder)?;
            // Parsers that never yield `End` still get a terminated stream.
            stream.finish().await.map_err(Interrupt::Encoder)?;
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PlainTextParser;
    use crate::stream::{MemorySink, StreamContext};
    use crate::types::ClaudeStreamEvent;
    use futures::stream;
    use std::sync::Arc;
    use std::time::Duration;

    fn sse(parts: &[&str]) -> String {
        parts
            .iter()
            .map(|p| format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{}\"}}}}]}}\n\n", p))
            .collect::<String>()
            + "data: [DONE]\n\n"
    }

    fn body(text: String) -> BoxStream<'static, Bytes> {
        Box::pin(stream::iter(vec![Ok(Bytes::from(text))]))
    }

    fn encoder(sink: Arc<MemorySink>) -> ClaudeStream {
        let context = StreamContext::new("r", 3).with_aggregation_interval(Duration::ZERO);
        ClaudeStream::new(context, sink)
    }

    #[tokio::test]
    async fn test_relay_plain_text_completes() {
        let sink = Arc::new(MemorySink::new());
        let claude = encoder(sink.clone());
        let outcome = relay(
            body(sse(&["Hel", "lo"])),
            &mut PlainTextParser,
            &claude,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(outcome.is_completed());

        let text: String = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ClaudeStreamEvent::ContentBlockDelta {
                    delta: crate::types::events::ContentDelta::TextDelta { text },
                    ..
                } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Hello");
        assert_eq!(
            sink.event_names().last().map(String::as_str),
            Some("message_stop")
        );
    }

    #[tokio::test]
    async fn test_relay_upstream_error_fails_stream() {
        let sink = Arc::new(MemorySink::new());
        let claude = encoder(sink.clone());
        let upstream: BoxStream<'static, Bytes> = Box::pin(stream::iter(vec![
            Ok(Bytes::from(sse(&["partial"]).replace("data: [DONE]\n\n", ""))),
            Err(Error::upstream(Some(502), "bad gateway")),
        ]));
        let outcome = relay(upstream, &mut PlainTextParser, &claude, &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, RelayOutcome::Failed(_)));

        let names = sink.event_names();
        assert_eq!(names.last().map(String::as_str), Some("error"));
        assert!(!names.iter().any(|n| n == "message_stop"));
    }

    #[tokio::test]
    async fn test_relay_cancelled_writes_nothing_more() {
        let sink = Arc::new(MemorySink::new());
        let claude = encoder(sink.clone());
        claude.start().await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let upstream: BoxStream<'static, Bytes> = Box::pin(stream::pending());
        let outcome = relay(upstream, &mut PlainTextParser, &claude, &cancel)
            .await
            .unwrap();
        assert!(matches!(outcome, RelayOutcome::Cancelled));
        assert_eq!(sink.event_names(), vec!["message_start"]);
        assert!(claude.is_finished().await);
    }
}
