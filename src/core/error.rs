use thiserror::Error;

use crate::remote::error::TransportError;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("An exchange is already in flight")]
    ConcurrentRequest,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;

impl ExchangeError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExchangeError::validation("prompt is empty");
        assert_eq!(err.to_string(), "Invalid request: prompt is empty");

        let err = ExchangeError::ConcurrentRequest;
        assert_eq!(err.to_string(), "An exchange is already in flight");
    }

    #[test]
    fn test_error_from_transport() {
        let err: ExchangeError = TransportError::Connection("refused".into()).into();
        assert!(matches!(err, ExchangeError::Transport(_)));
        assert_eq!(
            err.to_string(),
            "Transport error: Connection failed: refused"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ExchangeError = io_err.into();
        assert!(matches!(err, ExchangeError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: ExchangeError = json_err.into();
        assert!(matches!(err, ExchangeError::Json(_)));
    }
}
