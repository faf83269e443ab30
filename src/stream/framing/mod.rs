pub mod lines;
pub mod raw;
pub mod utf8;

pub use lines::{DEFAULT_EVENT_MARKER, LineEventFraming};
pub use raw::RawFraming;
pub use utf8::Utf8Decoder;

use serde::{Deserialize, Serialize};

/// One logical unit recovered from the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Fragment(String),
    Done,
    Error(String),
}

/// Decoding convention for a response body. Implementations own their
/// carry-over (undecoded bytes, partial lines) between calls.
pub trait FramingStrategy: Send {
    /// Decodes one chunk. Chunk boundaries carry no meaning.
    fn decode(&mut self, chunk: &[u8]) -> Vec<Frame>;

    /// Flushes carry-over once the stream is exhausted.
    fn finish(&mut self) -> Vec<Frame>;

    /// Discards carry-over without decoding it.
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FramingKind {
    #[default]
    Raw,
    Lines,
}

impl FramingKind {
    #[must_use]
    pub fn strategy(self, event_marker: &str) -> Box<dyn FramingStrategy> {
        match self {
            Self::Raw => Box::new(RawFraming::new()),
            Self::Lines => Box::new(LineEventFraming::with_marker(event_marker)),
        }
    }
}

#[cfg(test)]
pub(crate) fn fragments(frames: &[Frame]) -> String {
    frames
        .iter()
        .filter_map(|frame| match frame {
            Frame::Fragment(text) => Some(text.as_str()),
            Frame::Done | Frame::Error(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_builds_matching_strategy() {
        let mut raw = FramingKind::Raw.strategy(DEFAULT_EVENT_MARKER);
        assert_eq!(
            raw.decode(b"data: x\n"),
            vec![Frame::Fragment("data: x\n".into())]
        );

        let mut lines = FramingKind::Lines.strategy(DEFAULT_EVENT_MARKER);
        assert_eq!(lines.decode(b"data: {\"done\":true}\n"), vec![Frame::Done]);
    }

    #[test]
    fn test_kind_deserializes_lowercase() {
        let kind: FramingKind = serde_json::from_str("\"lines\"").unwrap();
        assert_eq!(kind, FramingKind::Lines);
    }
}
