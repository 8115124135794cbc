//! Server-Sent Events framing
//!
//! MCP servers may answer a POST with `text/event-stream` instead of plain JSON,
//! and the legacy binding delivers every response over a long-lived stream.
//! This module turns raw stream bytes into [`SseEvent`]s and pulls JSON-RPC
//! payloads back out of them.

use crate::error::ProtocolError;
use serde_json::Value;

/// Content type announcing event-stream framing
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// One dispatched event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if any
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`
    pub data: String,
    /// Value of the `id:` field, if any
    pub id: Option<String>,
}

impl SseEvent {
    /// Event type, defaulting to `message` as the SSE rules require
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }

    /// Whether the payload parses as a JSON-RPC message
    pub fn is_jsonrpc(&self) -> bool {
        serde_json::from_str::<Value>(&self.data)
            .map(|value| value.get("jsonrpc").is_some())
            .unwrap_or(false)
    }
}

#[derive(Debug, Default)]
struct PendingEvent {
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

/// Incremental decoder fed with arbitrary byte chunks
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    current: PendingEvent,
}

impl SseDecoder {
    /// Create a decoder with no buffered input
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every event it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let buffer = std::mem::take(&mut self.buffer);

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(len) = buffer[consumed..].iter().position(|b| *b == b'\n') {
            let line = String::from_utf8_lossy(&buffer[consumed..consumed + len]);
            let line = line.trim_end_matches('\r');
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
            consumed += len + 1;
        }

        self.buffer = buffer;
        self.buffer.drain(..consumed);
        events
    }

    /// Flush a trailing event when the stream ends without a blank line
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches('\r').to_string();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
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
            "event" => self.current.event = Some(value.to_string()),
            "data" => self.current.data.push(value.to_string()),
            "id" => self.current.id = Some(value.to_string()),
            // `retry` and unknown fields carry nothing we act on
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let pending = std::mem::take(&mut self.current);
        if pending.data.is_empty() && pending.event.is_none() {
            return None;
        }
        Some(SseEvent {
            event: pending.event,
            data: pending.data.join("\n"),
            id: pending.id,
        })
    }
}

/// Parse a complete event-stream body
pub fn parse_sse_events(text: &str) -> Vec<SseEvent> {
    let mut decoder = SseDecoder::new();
    let mut events = decoder.feed(text.as_bytes());
    events.extend(decoder.finish());
    events
}

/// Extract the JSON-RPC payload carried by an event-stream body.
///
/// Servers may emit notifications ahead of the response, so the first payload
/// that looks like a response (`result` or `error`) wins; otherwise the first
/// non-empty payload is returned.
pub fn extract_json_payload(text: &str) -> Result<String, ProtocolError> {
    let events = parse_sse_events(text);

    let response = events.iter().find(|event| {
        serde_json::from_str::<Value>(&event.data)
            .map(|value| value.get("result").is_some() || value.get("error").is_some())
            .unwrap_or(false)
    });
    if let Some(event) = response {
        return Ok(event.data.clone());
    }

    events
        .into_iter()
        .map(|event| event.data)
        .find(|data| !data.trim().is_empty())
        .ok_or(ProtocolError::EmptyEventStream)
}

/// Whether the text contains any event-stream field lines
pub fn has_stream_markers(text: &str) -> bool {
    text.lines().map(str::trim_start).any(|line| {
        line.starts_with("data:") || line.starts_with("event:") || line.starts_with("id:")
    })
}
