use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::remote::error::TransportError;
use crate::remote::transport::{ByteStream, Transport};

/// One canned response, replayed chunk by chunk.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Chunks(Vec<Bytes>),
    ChunksThenError(Vec<Bytes>, TransportError),
    /// Delivers the chunks, then never yields again.
    ChunksThenHang(Vec<Bytes>),
    Refuse(TransportError),
}

impl ScriptedResponse {
    #[must_use]
    pub fn chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        Self::Chunks(chunks.into_iter().map(Into::into).collect())
    }

    /// Splits `body` into chunks of `size` bytes, ignoring UTF-8 boundaries.
    #[must_use]
    pub fn split_every(body: &str, size: usize) -> Self {
        let size = size.max(1);
        Self::Chunks(
            body.as_bytes()
                .chunks(size)
                .map(Bytes::copy_from_slice)
                .collect(),
        )
    }

    #[must_use]
    pub fn chunks_then_error<I, C>(chunks: I, error: TransportError) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        Self::ChunksThenError(chunks.into_iter().map(Into::into).collect(), error)
    }

    #[must_use]
    pub fn chunks_then_hang<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        Self::ChunksThenHang(chunks.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub const fn refuse(error: TransportError) -> Self {
        Self::Refuse(error)
    }

    fn into_stream(self) -> Result<ByteStream, TransportError> {
        let ok = |chunks: Vec<Bytes>| {
            stream::iter(chunks.into_iter().map(Ok::<Bytes, TransportError>))
        };
        match self {
            Self::Chunks(chunks) => Ok(ok(chunks).boxed()),
            Self::ChunksThenError(chunks, error) => {
                Ok(ok(chunks).chain(stream::once(async move { Err(error) })).boxed())
            }
            Self::ChunksThenHang(chunks) => Ok(ok(chunks).chain(stream::pending()).boxed()),
            Self::Refuse(error) => Err(error),
        }
    }
}

#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    request_history: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_response(self, response: ScriptedResponse) -> Self {
        self.responses.lock().push_back(response);
        self
    }

    #[must_use]
    pub fn request_history(&self) -> Vec<serde_json::Value> {
        self.request_history.lock().clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_history.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn open(&self, body: serde_json::Value) -> Result<ByteStream, TransportError> {
        self.request_history.lock().push(body);

        let response = self.responses.lock().pop_front().ok_or_else(|| {
            TransportError::Connection("MockTransport: no responses queued".to_string())
        })?;
        response.into_stream()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn drain(mut stream: ByteStream) -> (String, Option<TransportError>) {
        let mut text = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => text.push_str(&String::from_utf8_lossy(&chunk)),
                Err(e) => return (text, Some(e)),
            }
        }
        (text, None)
    }

    #[tokio::test]
    async fn test_mock_replays_queued_responses_in_order() {
        let mock = MockTransport::new()
            .with_response(ScriptedResponse::chunks(["Hel", "lo"]))
            .with_response(ScriptedResponse::chunks(["second"]));

        let first = mock.open(json!({"question": "a"})).await.unwrap();
        assert_eq!(drain(first).await, ("Hello".to_string(), None));

        let second = mock.open(json!({"question": "b"})).await.unwrap();
        assert_eq!(drain(second).await.0, "second");

        assert_eq!(mock.request_count(), 2);
        assert_eq!(mock.request_history()[1], json!({"question": "b"}));
    }

    #[tokio::test]
    async fn test_mock_errors_when_empty() {
        let mock = MockTransport::new();
        let result = mock.open(json!({})).await;
        assert!(matches!(result, Err(TransportError::Connection(_))));
    }

    #[tokio::test]
    async fn test_mock_stream_error_after_chunks() {
        let mock = MockTransport::new().with_response(ScriptedResponse::chunks_then_error(
            ["partial"],
            TransportError::Stream("reset".into()),
        ));

        let stream = mock.open(json!({})).await.unwrap();
        let (text, error) = drain(stream).await;
        assert_eq!(text, "partial");
        assert_eq!(error, Some(TransportError::Stream("reset".into())));
    }

    #[test]
    fn test_split_every_covers_body() {
        let ScriptedResponse::Chunks(chunks) = ScriptedResponse::split_every("abcdefg", 3) else {
            panic!("expected chunks");
        };
        assert_eq!(chunks.len(), 3);
        assert_eq!(&chunks[2][..], b"g");
    }
}
