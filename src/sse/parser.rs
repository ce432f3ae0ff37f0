//! Incremental `text/event-stream` decoding.
//!
//! Bytes arrive in arbitrary chunks; only complete lines are interpreted, so a
//! record split mid-field (or mid UTF-8 sequence) decodes exactly as if it had
//! arrived in one piece.

use crate::error::RecordError;
use crate::sse::models::{PreloadComplete, StreamEvent, VoteEvent};
use tracing::warn;

const DEFAULT_EVENT: &str = "message";

/// Longest unterminated line kept while waiting for its newline. Past this the
/// line and the record it belongs to are dropped.
pub const MAX_PENDING_LINE: usize = 256 * 1024;

/// One dispatched record: the fields seen between two blank lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseRecord {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

#[derive(Debug, Default)]
pub struct EventStreamParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    skip_line: bool,
    skip_record: bool,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes a chunk and returns every record it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseRecord> {
        let chunk = if self.skip_line {
            match chunk.iter().position(|b| *b == b'\n') {
                Some(offset) => {
                    self.skip_line = false;
                    &chunk[offset + 1..]
                }
                None => return Vec::new(),
            }
        } else {
            chunk
        };
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + offset;
            let mut line = &self.buffer[consumed..end];
            if let [head @ .., b'\r'] = line {
                line = head;
            }
            let line = String::from_utf8_lossy(line).into_owned();
            consumed = end + 1;

            if self.skip_record {
                self.skip_record = !line.is_empty();
                continue;
            }
            if let Some(record) = self.process_line(&line) {
                records.push(record);
            }
        }
        self.buffer.drain(..consumed);

        if self.buffer.len() > MAX_PENDING_LINE {
            warn!(
                "Dropping event stream record: line exceeded {MAX_PENDING_LINE} bytes without a newline"
            );
            self.buffer.clear();
            self.event = None;
            self.data.clear();
            self.id = None;
            self.skip_line = true;
            self.skip_record = true;
        }

        records
    }

    /// Whether a partially received record is pending.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
            || self.event.is_some()
            || !self.data.is_empty()
            || self.skip_record
    }

    fn process_line(&mut self, line: &str) -> Option<SseRecord> {
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
            "event" => self.event = Some(value.to_owned()),
            "data" => self.data.push(value.to_owned()),
            "id" => self.id = Some(value.to_owned()),
            // retry and unknown fields carry nothing we act on
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseRecord> {
        let event = self.event.take();
        let id = self.id.take();
        if event.is_none() && self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseRecord {
            event: event.unwrap_or_else(|| DEFAULT_EVENT.to_owned()),
            data,
            id,
        })
    }
}

impl SseRecord {
    /// Interprets the record as one of the vote stream's event types.
    pub fn decode(&self) -> Result<StreamEvent, RecordError> {
        let malformed = |source| RecordError {
            event: self.event.clone(),
            source,
        };

        match self.event.as_str() {
            "connected" => Ok(StreamEvent::Connected),
            "heartbeat" => Ok(StreamEvent::Heartbeat),
            "vote" => serde_json::from_str::<VoteEvent>(&self.data)
                .map(StreamEvent::Vote)
                .map_err(malformed),
            "preload_complete" => serde_json::from_str::<PreloadComplete>(&self.data)
                .map(StreamEvent::PreloadComplete)
                .map_err(malformed),
            other => Ok(StreamEvent::Unknown(other.to_owned())),
        }
    }
}
