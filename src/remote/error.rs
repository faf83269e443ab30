use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Server responded with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TransportError {
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Builds a status error, preferring the message from a JSON error body
    /// (`{"error": "..."}` or `{"error": {"message": "..."}}`).
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                let error = v.get("error")?;
                error
                    .as_str()
                    .or_else(|| error.get("message")?.as_str())
                    .map(String::from)
            })
            .unwrap_or_else(|| format!("HTTP {status}"));

        Self::Status { status, message }
    }
}
