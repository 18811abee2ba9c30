//! SSE frames and the transport writer interface.

use crate::types::ClaudeStreamEvent;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// A named SSE event with its JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    pub event: String,
    pub data: Value,
}

impl SseFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn from_event(event: &ClaudeStreamEvent) -> Result<Self> {
        Ok(Self::new(event.event_name(), serde_json::to_value(event)?))
    }

    /// Parses the payload back into a typed event.
    pub fn to_event(&self) -> Result<ClaudeStreamEvent> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// `event: <name>\ndata: <json>\n\n`
    pub fn to_wire(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }
}

/// Transport writer. `flush` is false only for text deltas; a sink may
/// batch those but must flush everything else as a discrete frame.
/// Returning from `send` means the frame was accepted in order.
#[async_trait]
pub trait SseSink: Send + Sync {
    async fn send(&self, frame: SseFrame, flush: bool) -> Result<()>;
}

/// Serialized frame handed to the HTTP body.
#[derive(Debug, Clone)]
pub struct SseChunk {
    pub bytes: Bytes,
    pub flush: bool,
}

/// Forwards wire frames into a bounded channel drained by the HTTP layer.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<SseChunk>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SseChunk>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SseSink for ChannelSink {
    async fn send(&self, frame: SseFrame, flush: bool) -> Result<()> {
        let chunk = SseChunk {
            bytes: Bytes::from(frame.to_wire()),
            flush,
        };
        self.tx
            .send(chunk)
            .await
            .map_err(|_| Error::Sink(format!("receiver dropped before '{}'", frame.event)))
    }
}

/// Records frames in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Mutex<Vec<(SseFrame, bool)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<(SseFrame, bool)> {
        self.lock().clone()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.lock().iter().map(|(f, _)| f.event.clone()).collect()
    }

    /// Frames decoded into typed events; undecodable frames are skipped.
    pub fn events(&self) -> Vec<ClaudeStreamEvent> {
        self.lock()
            .iter()
            .filter_map(|(f, _)| f.to_event().ok())
            .collect()
    }

    pub fn wire(&self) -> String {
        self.lock().iter().map(|(f, _)| f.to_wire()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SseFrame, bool)>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SseSink for MemorySink {
    async fn send(&self, frame: SseFrame, flush: bool) -> Result<()> {
        self.lock().push((frame, flush));
        Ok(())
    }
}
