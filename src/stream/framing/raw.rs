use super::utf8::Utf8Decoder;
use super::{Frame, FramingStrategy};

/// Plain text with no structure: every decoded chunk is a fragment.
#[derive(Debug, Default)]
pub struct RawFraming {
    decoder: Utf8Decoder,
}

impl RawFraming {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            decoder: Utf8Decoder::new(),
        }
    }
}

fn fragment(text: String) -> Vec<Frame> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Frame::Fragment(text)]
    }
}

impl FramingStrategy for RawFraming {
    fn decode(&mut self, chunk: &[u8]) -> Vec<Frame> {
        fragment(self.decoder.decode(chunk))
    }

    fn finish(&mut self) -> Vec<Frame> {
        fragment(self.decoder.finish())
    }

    fn reset(&mut self) {
        self.decoder.reset();
    }
}
