pub mod error;
pub mod gate;
pub mod session;
pub mod transcript;
pub mod types;

pub use error::{ExchangeError, Result};
pub use gate::{ExchangeGate, ExchangePermit};
pub use session::{ChatSession, ExchangeOutcome, SessionConfig};
pub use transcript::{TranscriptSnapshot, TranscriptStore};
pub use types::{
    ExchangeOptions, ExchangeRequest, IngestionEvent, IngestionState, IngestionStatus, Message,
    PromptKey, Role,
};
