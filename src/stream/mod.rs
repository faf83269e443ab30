pub mod framing;
pub mod ingestor;

pub use framing::{Frame, FramingKind, FramingStrategy, LineEventFraming, RawFraming};
pub use ingestor::StreamIngestor;
