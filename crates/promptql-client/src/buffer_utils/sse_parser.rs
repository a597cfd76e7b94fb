use futures::{Stream, StreamExt};
use reqwest::Response;
use std::fmt::Display;
use std::pin::Pin;

use super::buffering::CircularLineBuffer;
use crate::error::{PromptQlError, Result};

pub type SseEventStream = Pin<Box<dyn Stream<Item = Result<SseEvent>> + Send>>;

/// One dispatched server-sent event block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// `event:` field, `message` when the block has none
    pub event: String,
    pub data: String,
}

impl SseEvent {
    pub fn is(&self, event_type: &str) -> bool {
        self.event == event_type
    }
}

/// Line-at-a-time SSE block assembler
#[derive(Debug, Default)]
pub struct SseDecoder {
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; a blank line dispatches the pending block
    pub fn push_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.trim().is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.trim().to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry carry nothing we act on
            _ => {}
        }
        None
    }

    /// Flush a trailing block that was never terminated by a blank line
    pub fn finish(&mut self) -> Option<SseEvent> {
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

/// Decode every event block in an in-memory body
pub fn parse_sse_text(body: &str) -> Vec<SseEvent> {
    let mut decoder = SseDecoder::new();
    let mut events: Vec<SseEvent> = body.lines().filter_map(|line| decoder.push_line(line)).collect();
    events.extend(decoder.finish());
    events
}

/// Decode an arbitrary chunked byte stream into event blocks
pub fn decode_sse_stream<S, B, E>(stream: S) -> SseEventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(stream);
        let mut buffer = CircularLineBuffer::with_capacity(8192);
        let mut decoder = SseDecoder::new();

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(bytes.as_ref());

                    while let Some(line_result) = buffer.next_line() {
                        match line_result {
                            Ok(line) => {
                                if let Some(event) = decoder.push_line(&line) {
                                    yield Ok(event);
                                }
                            }
                            Err(e) => yield Err(e),
                        }
                    }
                }
                Err(e) => {
                    yield Err(PromptQlError::Connection(format!("Event stream error: {}", e)));
                    return;
                }
            }
        }

        if let Some(line_result) = buffer.take_remaining() {
            match line_result {
                Ok(line) => {
                    if let Some(event) = decoder.push_line(&line) {
                        yield Ok(event);
                    }
                }
                Err(e) => yield Err(e),
            }
        }
        if let Some(event) = decoder.finish() {
            yield Ok(event);
        }
    })
}

/// Event blocks from a `text/event-stream` response body
pub fn sse_events(response: Response) -> SseEventStream {
    decode_sse_stream(response.bytes_stream())
}
