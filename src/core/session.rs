use tokio_util::sync::CancellationToken;

use super::error::{ExchangeError, Result};
use super::transcript::{DEFAULT_FAILURE_NOTICE, TranscriptStore};
use super::types::{ExchangeOptions, ExchangeRequest, IngestionEvent, IngestionStatus};
use crate::remote::dispatcher::{RequestDispatcher, StreamHandle};
use crate::stream::framing::{DEFAULT_EVENT_MARKER, FramingKind};
use crate::stream::ingestor::StreamIngestor;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub framing: FramingKind,
    pub event_marker: String,
    pub failure_notice: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            framing: FramingKind::default(),
            event_marker: DEFAULT_EVENT_MARKER.to_string(),
            failure_notice: DEFAULT_FAILURE_NOTICE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Completed,
    Failed,
    Cancelled,
}

/// Runs exchanges one at a time: dispatch, ingest, commit to the transcript.
#[derive(Debug)]
pub struct ChatSession {
    dispatcher: RequestDispatcher,
    config: SessionConfig,
    transcript: TranscriptStore,
}

impl ChatSession {
    #[must_use]
    pub fn new(dispatcher: RequestDispatcher, config: SessionConfig) -> Self {
        let transcript = TranscriptStore::with_failure_notice(config.failure_notice.as_str());
        Self {
            dispatcher,
            config,
            transcript,
        }
    }

    #[must_use]
    pub const fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.dispatcher.is_busy() || self.transcript.status() == IngestionStatus::Streaming
    }

    /// Runs one exchange to its end. `on_event` sees each event after it has
    /// been applied to the transcript.
    ///
    /// Invalid or overlapping submissions are rejected before anything is
    /// recorded. Transport failures are not errors here: they end up as the
    /// failure notice in the transcript.
    pub async fn ask<F>(
        &mut self,
        prompt: impl Into<String>,
        options: ExchangeOptions,
        cancel: CancellationToken,
        mut on_event: F,
    ) -> Result<ExchangeOutcome>
    where
        F: FnMut(&IngestionEvent, &TranscriptStore),
    {
        let request = ExchangeRequest::new(prompt, options)?;
        if self.is_busy() {
            return Err(ExchangeError::ConcurrentRequest);
        }

        self.transcript.submit_user_message(request.prompt())?;

        let dispatched = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = self.dispatcher.send(&request, cancel.clone()) => Some(result),
        };

        let handle = match dispatched {
            None => {
                self.transcript.abandon();
                return Ok(ExchangeOutcome::Cancelled);
            }
            Some(Ok(handle)) => handle,
            Some(Err(ExchangeError::Transport(e))) => {
                tracing::error!(error = %e, "Generation request failed");
                let event = IngestionEvent::Failed(e.to_string());
                self.transcript.apply_event(&event);
                on_event(&event, &self.transcript);
                return Ok(ExchangeOutcome::Failed);
            }
            Some(Err(e)) => {
                self.transcript.abandon();
                return Err(e);
            }
        };

        Ok(self.drive(handle, &mut on_event).await)
    }

    async fn drive<F>(&mut self, handle: StreamHandle, on_event: &mut F) -> ExchangeOutcome
    where
        F: FnMut(&IngestionEvent, &TranscriptStore),
    {
        let framing = self.config.framing.strategy(&self.config.event_marker);
        let mut ingestor = StreamIngestor::consume(handle, framing);

        while let Some(event) = ingestor.next_event().await {
            if let IngestionEvent::Failed(detail) = &event {
                tracing::error!(detail = %detail, "Answer stream failed");
            }
            self.transcript.apply_event(&event);
            on_event(&event, &self.transcript);
        }

        match self.transcript.status() {
            IngestionStatus::Completed => ExchangeOutcome::Completed,
            IngestionStatus::Failed => ExchangeOutcome::Failed,
            IngestionStatus::Idle | IngestionStatus::Streaming => {
                tracing::info!("Exchange cancelled before completion");
                self.transcript.abandon();
                ExchangeOutcome::Cancelled
            }
        }
    }
}
