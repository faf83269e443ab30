use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::core::error::Result;
use crate::core::gate::{ExchangeGate, ExchangePermit};
use crate::core::types::{ExchangeOptions, ExchangeRequest, IngestionStatus, PromptKey};
use crate::remote::transport::{ByteStream, Transport};

/// An open response body together with the exchange's permit and its
/// cancellation signal. Consumed by the stream ingestor.
pub struct StreamHandle {
    stream: ByteStream,
    permit: Option<ExchangePermit>,
    cancel: CancellationToken,
}

impl StreamHandle {
    /// Wraps a stream that is not tracked by any gate.
    #[must_use]
    pub fn detached(stream: ByteStream, cancel: CancellationToken) -> Self {
        Self {
            stream,
            permit: None,
            cancel,
        }
    }

    pub(crate) fn into_parts(self) -> (ByteStream, Option<ExchangePermit>, CancellationToken) {
        (self.stream, self.permit, self.cancel)
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("gated", &self.permit.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Issues one generation request per call and refuses to overlap exchanges.
#[derive(Clone)]
pub struct RequestDispatcher {
    transport: Arc<dyn Transport>,
    prompt_key: PromptKey,
    gate: ExchangeGate,
}

impl RequestDispatcher {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            prompt_key: PromptKey::default(),
            gate: ExchangeGate::new(),
        }
    }

    #[must_use]
    pub const fn with_prompt_key(mut self, prompt_key: PromptKey) -> Self {
        self.prompt_key = prompt_key;
        self
    }

    #[must_use]
    pub fn with_gate(mut self, gate: ExchangeGate) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub const fn gate(&self) -> &ExchangeGate {
        &self.gate
    }

    #[must_use]
    pub fn status(&self) -> IngestionStatus {
        self.gate.status()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Validates the prompt, then dispatches it.
    pub async fn send_prompt(
        &self,
        prompt: impl Into<String>,
        options: ExchangeOptions,
        cancel: CancellationToken,
    ) -> Result<StreamHandle> {
        let request = ExchangeRequest::new(prompt, options)?;
        self.send(&request, cancel).await
    }

    pub async fn send(
        &self,
        request: &ExchangeRequest,
        cancel: CancellationToken,
    ) -> Result<StreamHandle> {
        let permit = self.gate.try_begin()?;
        let body = request.to_body(self.prompt_key)?;

        tracing::debug!(
            transport = self.transport.name(),
            prompt_key = self.prompt_key.as_str(),
            "Dispatching generation request"
        );

        let stream = self.transport.open(body).await?;

        Ok(StreamHandle {
            stream,
            permit: Some(permit),
            cancel,
        })
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("transport", &self.transport.name())
            .field("prompt_key", &self.prompt_key)
            .field("status", &self.gate.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ExchangeError;
    use crate::remote::error::TransportError;
    use crate::remote::mock::{MockTransport, ScriptedResponse};

    fn dispatcher(mock: &MockTransport) -> RequestDispatcher {
        RequestDispatcher::new(Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_blank_prompt_fails_before_io() {
        let mock = MockTransport::new().with_response(ScriptedResponse::chunks(["x"]));
        let dispatcher = dispatcher(&mock);

        let err = dispatcher
            .send_prompt("   ", ExchangeOptions::new(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::Validation(_)));
        assert_eq!(mock.request_count(), 0);
        assert_eq!(dispatcher.status(), IngestionStatus::Idle);
    }

    #[tokio::test]
    async fn test_send_marks_gate_streaming() {
        let mock = MockTransport::new().with_response(ScriptedResponse::chunks(["x"]));
        let dispatcher = dispatcher(&mock);

        let handle = dispatcher
            .send_prompt("What is riba?", ExchangeOptions::new(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(dispatcher.status(), IngestionStatus::Streaming);
        drop(handle);
        assert_eq!(dispatcher.status(), IngestionStatus::Idle);
    }

    #[tokio::test]
    async fn test_concurrent_send_rejected() {
        let mock = MockTransport::new()
            .with_response(ScriptedResponse::chunks(["first"]))
            .with_response(ScriptedResponse::chunks(["second"]));
        let dispatcher = dispatcher(&mock);

        let _first = dispatcher
            .send_prompt("one", ExchangeOptions::new(), CancellationToken::new())
            .await
            .unwrap();
        let err = dispatcher
            .clone()
            .send_prompt("two", ExchangeOptions::new(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::ConcurrentRequest));
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_releases_gate() {
        let mock = MockTransport::new().with_response(ScriptedResponse::refuse(
            TransportError::Connection("connection refused".into()),
        ));
        let dispatcher = dispatcher(&mock);

        let err = dispatcher
            .send_prompt("hi", ExchangeOptions::new(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ExchangeError::Transport(TransportError::Connection(_))
        ));
        assert_eq!(dispatcher.status(), IngestionStatus::Idle);
    }

    #[tokio::test]
    async fn test_body_uses_configured_prompt_key() {
        let mock = MockTransport::new().with_response(ScriptedResponse::chunks(["ok"]));
        let dispatcher = dispatcher(&mock).with_prompt_key(PromptKey::Message);

        let options = ExchangeOptions::new().with_deep_analysis(true);
        dispatcher
            .send_prompt("hi", options, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            mock.request_history()[0],
            serde_json::json!({"message": "hi", "deep_analysis": true})
        );
    }
}
