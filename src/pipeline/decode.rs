//! Streaming decoder for OpenAI-style SSE (Bytes -> chunk).

use crate::types::OpenAIStreamChunk;
use crate::BoxStream;
use bytes::Bytes;
use futures::{stream, StreamExt};
use tracing::debug;

/// Incremental SSE decoder:
/// - splits frames on a blank line (`\r\n` normalized to `\n`)
/// - strips the `data:` prefix
/// - stops on `[DONE]`
/// - ignores `:` comment lines and frames that are not chunk JSON
///
/// Bytes are buffered undecoded so multi-byte characters split across
/// network chunks survive.
#[derive(Debug, Clone)]
pub struct OpenAiSseDecoder {
    done_signal: String,
}

impl Default for OpenAiSseDecoder {
    fn default() -> Self {
        Self {
            done_signal: "[DONE]".to_string(),
        }
    }
}

impl OpenAiSseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode_stream(
        &self,
        input: BoxStream<'static, Bytes>,
    ) -> BoxStream<'static, OpenAIStreamChunk> {
        let done_signal = self.done_signal.clone();

        let stream = stream::unfold(
            (input, Vec::<u8>::new(), false),
            move |(mut input, mut buf, mut eof)| {
                let done_signal = done_signal.clone();
                async move {
                    loop {
                        if let Some((frame, rest)) = split_frame(&buf) {
                            let frame = String::from_utf8_lossy(frame).into_owned();
                            buf = rest.to_vec();
                            match parse_frame(&frame, &done_signal) {
                                Frame::Done => return None,
                                Frame::Chunk(chunk) => return Some((Ok(chunk), (input, buf, eof))),
                                Frame::Skip => continue,
                            }
                        }

                        if eof {
                            // Trailing frame without its blank line.
                            let frame = String::from_utf8_lossy(&buf).into_owned();
                            buf.clear();
                            return match parse_frame(&frame, &done_signal) {
                                Frame::Chunk(chunk) => Some((Ok(chunk), (input, buf, eof))),
                                _ => None,
                            };
                        }

                        match input.next().await {
                            Some(Ok(bytes)) => {
                                buf.extend(bytes.iter().filter(|b| **b != b'\r'));
                            }
                            Some(Err(e)) => return Some((Err(e), (input, buf, eof))),
                            None => eof = true,
                        }
                    }
                }
            },
        );

        Box::pin(stream)
    }

    /// Non-empty `choices[0].delta.content` strings, in order.
    pub fn text_deltas(&self, input: BoxStream<'static, Bytes>) -> BoxStream<'static, String> {
        let chunks = self.decode_stream(input);
        Box::pin(chunks.filter_map(|item| async move {
            match item {
                Ok(chunk) => chunk.text().map(|t| Ok(t.to_string())),
                Err(e) => Some(Err(e)),
            }
        }))
    }
}

enum Frame {
    Chunk(OpenAIStreamChunk),
    Done,
    Skip,
}

fn split_frame(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    buf.windows(2)
        .position(|w| w == b"\n\n")
        .map(|idx| (&buf[..idx], &buf[idx + 2..]))
}

fn parse_frame(frame: &str, done_signal: &str) -> Frame {
    let mut data = String::new();
    for line in frame.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(payload) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(payload.trim_start());
        }
        // `event:`, `id:` and `retry:` fields carry nothing we use.
    }

    let data = data.trim();
    if data.is_empty() {
        return Frame::Skip;
    }
    if data == done_signal {
        return Frame::Done;
    }
    match serde_json::from_str::<OpenAIStreamChunk>(data) {
        Ok(chunk) => Frame::Chunk(chunk),
        Err(e) => {
            debug!(error = %e, frame = data, "skipping undecodable upstream frame");
            Frame::Skip
        }
    }
}
