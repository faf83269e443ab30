use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use super::error::TransportError;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Opens a streamed response for one request body.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;
    async fn open(&self, body: serde_json::Value) -> Result<ByteStream, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn open(&self, body: serde_json::Value) -> Result<ByteStream, TransportError> {
            let chunk = Bytes::from(body.to_string());
            Ok(Box::pin(futures::stream::iter(vec![Ok(chunk)])))
        }
    }

    #[tokio::test]
    async fn test_transport_trait_object_safe() {
        let transport: Box<dyn Transport> = Box::new(EchoTransport);
        assert_eq!(transport.name(), "echo");

        let mut stream = transport
            .open(serde_json::json!({"question": "hi"}))
            .await
            .unwrap();
        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(&chunk[..], br#"{"question":"hi"}"#);
        assert!(stream.next().await.is_none());
    }
}
