use serde::Deserialize;
use serde_json::Value;

use super::{Frame, FramingStrategy};

pub const DEFAULT_EVENT_MARKER: &str = "data:";

#[derive(Debug, Deserialize)]
struct EventPayload {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    done: Option<bool>,
}

/// Newline-delimited events. Each complete line that starts with the marker
/// carries a JSON payload: `{"content": ..}`, `{"error": ..}` or
/// `{"done": true}`. Everything else is skipped.
#[derive(Debug)]
pub struct LineEventFraming {
    marker: String,
    buffer: Vec<u8>,
}

impl LineEventFraming {
    #[must_use]
    pub fn new() -> Self {
        Self::with_marker(DEFAULT_EVENT_MARKER)
    }

    #[must_use]
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            buffer: Vec::new(),
        }
    }

    /// Bytes of an incomplete line carried over to the next chunk.
    #[must_use]
    pub fn carry_over(&self) -> &[u8] {
        &self.buffer
    }

    fn parse_line(&self, raw: &[u8]) -> Option<Frame> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\n', '\r']);

        let Some(payload) = line.strip_prefix(self.marker.as_str()) else {
            if !line.is_empty() {
                tracing::trace!(line = %line, "Skipping line without event marker");
            }
            return None;
        };
        let payload = payload.trim();

        let event: EventPayload = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, payload = %payload, "Skipping malformed event payload");
                return None;
            }
        };

        if let Some(error) = event.error {
            let message = match error {
                Value::String(message) => message,
                other => other.to_string(),
            };
            return Some(Frame::Error(message));
        }
        if let Some(content) = event.content {
            return Some(Frame::Fragment(content));
        }
        if event.done == Some(true) {
            return Some(Frame::Done);
        }

        tracing::debug!(payload = %payload, "Skipping event with unrecognised shape");
        None
    }
}

impl Default for LineEventFraming {
    fn default() -> Self {
        Self::new()
    }
}

impl FramingStrategy for LineEventFraming {
    fn decode(&mut self, chunk: &[u8]) -> Vec<Frame> {
        // The carry-over never holds a newline, so only the new bytes need scanning.
        let mut cursor = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut line_start = 0;
        while let Some(offset) = self.buffer[cursor..].iter().position(|b| *b == b'\n') {
            let line_end = cursor + offset + 1;
            frames.extend(self.parse_line(&self.buffer[line_start..line_end]));
            line_start = line_end;
            cursor = line_end;
        }
        self.buffer.drain(..line_start);
        frames
    }

    /// An unterminated last line is still a line once the stream has ended.
    fn finish(&mut self) -> Vec<Frame> {
        let tail = std::mem::take(&mut self.buffer);
        self.parse_line(&tail).into_iter().collect()
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}
