use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::error::{ExchangeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A committed transcript entry. Built once its content is final and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: Uuid,
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Which JSON key carries the prompt in the outbound body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PromptKey {
    #[default]
    Question,
    Message,
}

impl PromptKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Message => "message",
        }
    }
}

/// Optional request parameters. Anything left unset is omitted from the wire
/// body so the service applies its own default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_analysis: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frameworks: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ExchangeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_deep_analysis(mut self, enabled: bool) -> Self {
        self.deep_analysis = Some(enabled);
        self
    }

    /// Restricts analysis to the given frameworks. An empty list means "all",
    /// which is the same as not sending the key at all.
    #[must_use]
    pub fn with_frameworks<I, S>(mut self, frameworks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let frameworks: Vec<String> = frameworks.into_iter().map(Into::into).collect();
        self.frameworks = (!frameworks.is_empty()).then_some(frameworks);
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Outbound payload for a single exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRequest {
    prompt: String,
    options: ExchangeOptions,
}

impl ExchangeRequest {
    pub fn new(prompt: impl Into<String>, options: ExchangeOptions) -> Result<Self> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(ExchangeError::validation("prompt must not be empty"));
        }
        Ok(Self { prompt, options })
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn to_body(&self, key: PromptKey) -> Result<Value> {
        let mut body = match serde_json::to_value(&self.options)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        body.insert(key.as_str().to_string(), Value::String(self.prompt.clone()));
        Ok(Value::Object(body))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionStatus {
    #[default]
    Idle,
    Streaming,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionEvent {
    PartialUpdate(String),
    Completed(String),
    Failed(String),
}

impl IngestionEvent {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    #[must_use]
    pub const fn terminal_status(&self) -> Option<IngestionStatus> {
        match self {
            Self::PartialUpdate(_) => None,
            Self::Completed(_) => Some(IngestionStatus::Completed),
            Self::Failed(_) => Some(IngestionStatus::Failed),
        }
    }
}

/// Per-exchange ingestion progress. Reset before each new submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionState {
    pub accumulated_text: String,
    pub status: IngestionStatus,
    pub error_detail: Option<String>,
}

impl IngestionState {
    #[must_use]
    pub fn streaming() -> Self {
        Self {
            status: IngestionStatus::Streaming,
            ..Self::default()
        }
    }
}
