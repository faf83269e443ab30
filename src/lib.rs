//! Streaming answer client: sends a question to a generation endpoint,
//! ingests the streamed reply incrementally and keeps the conversation
//! transcript.

pub mod cli;
pub mod config;
pub mod core;
pub mod logging;
pub mod remote;
pub mod stream;
