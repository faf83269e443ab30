use super::error::{ExchangeError, Result};
use super::types::{IngestionEvent, IngestionState, IngestionStatus, Message};

pub const DEFAULT_FAILURE_NOTICE: &str =
    "Sorry, something went wrong while generating the answer. Please try again.";

/// Point-in-time copy of the transcript for a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptSnapshot {
    pub messages: Vec<Message>,
    pub partial: Option<String>,
}

/// Append-only exchange history plus the uncommitted partial answer of the
/// exchange currently streaming.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    messages: Vec<Message>,
    ingestion: IngestionState,
    failure_notice: String,
}

impl TranscriptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_failure_notice(DEFAULT_FAILURE_NOTICE)
    }

    #[must_use]
    pub fn with_failure_notice(notice: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            ingestion: IngestionState::default(),
            failure_notice: notice.into(),
        }
    }

    /// Commits the user's prompt and opens a fresh ingestion state for its
    /// answer. Returns the prompt's position in the transcript.
    pub fn submit_user_message(&mut self, text: impl Into<String>) -> Result<usize> {
        if self.ingestion.status == IngestionStatus::Streaming {
            return Err(ExchangeError::ConcurrentRequest);
        }

        self.messages.push(Message::user(text));
        self.ingestion = IngestionState::streaming();
        Ok(self.messages.len() - 1)
    }

    /// Applies one ingestion event to the streaming exchange. Returns `false`
    /// when nothing is streaming, which is how events arriving after a
    /// terminal one are dropped.
    pub fn apply_event(&mut self, event: &IngestionEvent) -> bool {
        if self.ingestion.status != IngestionStatus::Streaming {
            tracing::warn!(
                status = ?self.ingestion.status,
                "Dropping ingestion event outside of a streaming exchange"
            );
            return false;
        }

        match event {
            IngestionEvent::PartialUpdate(delta) => {
                self.ingestion.accumulated_text.push_str(delta);
            }
            IngestionEvent::Completed(final_text) => {
                self.messages.push(Message::assistant(final_text.as_str()));
                self.ingestion.accumulated_text.clear();
                self.ingestion.status = IngestionStatus::Completed;
            }
            IngestionEvent::Failed(detail) => {
                self.messages
                    .push(Message::assistant(self.failure_notice.as_str()));
                self.ingestion.accumulated_text.clear();
                self.ingestion.error_detail = Some(detail.clone());
                self.ingestion.status = IngestionStatus::Failed;
            }
        }
        true
    }

    /// Drops the streaming exchange without committing an assistant entry.
    pub fn abandon(&mut self) {
        if self.ingestion.status == IngestionStatus::Streaming {
            self.ingestion = IngestionState::default();
        }
    }

    #[must_use]
    pub fn partial_text(&self) -> Option<&str> {
        (self.ingestion.status == IngestionStatus::Streaming)
            .then_some(self.ingestion.accumulated_text.as_str())
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub const fn status(&self) -> IngestionStatus {
        self.ingestion.status
    }

    #[must_use]
    pub fn error_detail(&self) -> Option<&str> {
        self.ingestion.error_detail.as_deref()
    }

    #[must_use]
    pub fn failure_notice(&self) -> &str {
        &self.failure_notice
    }

    #[must_use]
    pub fn snapshot(&self) -> TranscriptSnapshot {
        TranscriptSnapshot {
            messages: self.messages.clone(),
            partial: self.partial_text().map(str::to_owned),
        }
    }
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;

    fn partial(text: &str) -> IngestionEvent {
        IngestionEvent::PartialUpdate(text.to_string())
    }

    #[test]
    fn test_submit_returns_ordinal() {
        let mut store = TranscriptStore::new();
        assert_eq!(store.submit_user_message("first").unwrap(), 0);
        store.apply_event(&IngestionEvent::Completed("answer".into()));
        assert_eq!(store.submit_user_message("second").unwrap(), 2);
    }

    #[test]
    fn test_submit_rejected_while_streaming() {
        let mut store = TranscriptStore::new();
        store.submit_user_message("first").unwrap();

        let err = store.submit_user_message("second").unwrap_err();
        assert!(matches!(err, ExchangeError::ConcurrentRequest));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_partial_buffer_is_concatenation() {
        let mut store = TranscriptStore::new();
        store.submit_user_message("q").unwrap();

        let deltas = ["Riba ", "is ", "", "inter", "est."];
        for delta in deltas {
            assert!(store.apply_event(&partial(delta)));
        }

        assert_eq!(store.partial_text(), Some("Riba is interest."));
        assert_eq!(store.len(), 1, "partial text must not be committed");
    }

    #[test]
    fn test_completed_commits_and_clears_partial() {
        let mut store = TranscriptStore::new();
        store.submit_user_message("q").unwrap();
        store.apply_event(&partial("Riba is "));
        store.apply_event(&IngestionEvent::Completed("Riba is interest.".into()));

        assert_eq!(store.len(), 2);
        let answer = store.last_message().unwrap();
        assert_eq!(answer.role(), Role::Assistant);
        assert_eq!(answer.content(), "Riba is interest.");
        assert_eq!(store.partial_text(), None);
        assert_eq!(store.status(), IngestionStatus::Completed);
    }

    #[test]
    fn test_failed_commits_notice_not_detail() {
        let mut store = TranscriptStore::with_failure_notice("Something went wrong.");
        store.submit_user_message("q").unwrap();
        store.apply_event(&partial("half an ans"));
        store.apply_event(&IngestionEvent::Failed("upstream timeout".into()));

        let answer = store.last_message().unwrap();
        assert_eq!(answer.content(), "Something went wrong.");
        assert_eq!(store.error_detail(), Some("upstream timeout"));
        assert_eq!(store.status(), IngestionStatus::Failed);
        assert_eq!(store.partial_text(), None);
    }

    #[test]
    fn test_events_after_terminal_are_dropped() {
        let mut store = TranscriptStore::new();
        store.submit_user_message("q").unwrap();
        store.apply_event(&IngestionEvent::Completed("done".into()));

        assert!(!store.apply_event(&partial("late")));
        assert!(!store.apply_event(&IngestionEvent::Completed("again".into())));
        assert!(!store.apply_event(&IngestionEvent::Failed("late failure".into())));

        assert_eq!(store.len(), 2);
        assert_eq!(store.last_message().unwrap().content(), "done");
    }

    #[test]
    fn test_abandon_leaves_only_user_message() {
        let mut store = TranscriptStore::new();
        store.submit_user_message("q").unwrap();
        store.apply_event(&partial("a"));
        store.apply_event(&partial("b"));
        store.abandon();

        assert_eq!(store.len(), 1);
        assert_eq!(store.messages()[0].role(), Role::User);
        assert_eq!(store.status(), IngestionStatus::Idle);
        assert_eq!(store.partial_text(), None);
        assert!(store.submit_user_message("next").is_ok());
    }

    #[test]
    fn test_snapshot_exposes_partial_separately() {
        let mut store = TranscriptStore::new();
        store.submit_user_message("q").unwrap();
        store.apply_event(&partial("so far"));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.partial.as_deref(), Some("so far"));
    }
}
