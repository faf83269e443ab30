use reqwest::Url;
use std::fmt;

use super::error::TransportError;

/// Absolute http(s) URL of the generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(Url);

impl Endpoint {
    pub fn parse(url: &str) -> Result<Self, TransportError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(TransportError::Configuration(
                "endpoint must not be empty".to_string(),
            ));
        }
        let parsed = Url::parse(trimmed).map_err(|e| {
            TransportError::Configuration(format!("invalid endpoint {trimmed}: {e}"))
        })?;
        match parsed.scheme() {
            "http" | "https" if parsed.host_str().is_some() => Ok(Self(parsed)),
            "http" | "https" => Err(TransportError::Configuration(format!(
                "endpoint has no host: {trimmed}"
            ))),
            scheme => Err(TransportError::Configuration(format!(
                "endpoint must be an http(s) URL, got scheme {scheme}"
            ))),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}
