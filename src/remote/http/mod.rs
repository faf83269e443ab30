use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::RetryTransientMiddleware;
use reqwest_retry::policies::ExponentialBackoff;
use std::time::Duration;

use crate::remote::error::TransportError;
use crate::remote::transport::{ByteStream, Transport};
use crate::remote::types::Endpoint;

/// Only the connect phase is bounded. A streamed answer runs for as long as
/// the service keeps writing; deadlines are applied by cancelling the exchange.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub retry_min_delay: Duration,
    pub retry_max_delay: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_retries: 0,
            retry_min_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
            user_agent: Some(concat!("scholar/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

impl HttpConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

#[derive(Clone)]
pub struct HttpClient {
    inner: ClientWithMiddleware,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(HttpConfig::default())
    }

    pub fn with_config(config: HttpConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder().connect_timeout(config.connect_timeout);

        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua);
        }

        let client = builder.build().map_err(|e| {
            TransportError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        let mut client_builder = ClientBuilder::new(client);
        if config.max_retries > 0 {
            let retry_policy = ExponentialBackoff::builder()
                .retry_bounds(config.retry_min_delay, config.retry_max_delay)
                .build_with_max_retries(config.max_retries);
            client_builder =
                client_builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }

        Ok(Self {
            inner: client_builder.build(),
            config,
        })
    }

    #[must_use]
    pub fn post(&self, url: &str) -> reqwest_middleware::RequestBuilder {
        self.inner.post(url)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// POSTs the request body as JSON and hands back the response body as a
/// byte stream. Anything other than `200 OK` is a transport failure.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
    endpoint: Endpoint,
}

impl HttpTransport {
    pub fn new(endpoint: Endpoint) -> Result<Self, TransportError> {
        Ok(Self {
            http: HttpClient::new()?,
            endpoint,
        })
    }

    pub fn with_http_config(
        endpoint: Endpoint,
        http_config: HttpConfig,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            http: HttpClient::with_config(http_config)?,
            endpoint,
        })
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn open(&self, body: serde_json::Value) -> Result<ByteStream, TransportError> {
        let body = serde_json::to_string(&body)
            .map_err(|e| TransportError::Configuration(format!("Unserializable body: {e}")))?;

        tracing::debug!(endpoint = %self.endpoint, bytes = body.len(), "Opening response stream");

        let response = self
            .http
            .post(self.endpoint.as_str())
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_body = response.text().await.unwrap_or_default();
            return Err(TransportError::from_status(status.as_u16(), &error_body));
        }

        let byte_stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Stream(e.to_string())));

        Ok(Box::pin(byte_stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn transport_for(server: &mockito::Server) -> HttpTransport {
        let endpoint = Endpoint::parse(&format!("{}/generate", server.url())).expect("endpoint");
        HttpTransport::new(endpoint).expect("transport")
    }

    async fn collect(mut stream: ByteStream) -> String {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.expect("chunk"));
        }
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn test_http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 0);
        assert!(config.user_agent.unwrap().starts_with("scholar/"));
    }

    #[test]
    fn test_http_config_builder() {
        let config = HttpConfig::new()
            .with_connect_timeout(Duration::from_secs(3))
            .with_max_retries(2)
            .with_user_agent("test-agent");

        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.user_agent, Some("test-agent".to_string()));
        assert!(HttpClient::with_config(config).is_ok());
    }

    #[test]
    fn test_http_client_debug() {
        let client = HttpClient::new().expect("client");
        let debug = format!("{client:?}");
        assert!(debug.contains("HttpClient"));
    }

    #[tokio::test]
    async fn test_open_posts_json_and_streams_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/generate")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({"question": "What is riba?"})))
            .with_status(200)
            .with_body("Riba is interest.")
            .create_async()
            .await;

        let transport = transport_for(&server);
        let stream = transport
            .open(serde_json::json!({"question": "What is riba?"}))
            .await
            .expect("open");

        assert_eq!(collect(stream).await, "Riba is interest.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_open_rejects_non_ok_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/generate")
            .with_status(503)
            .with_body(r#"{"error": "model overloaded"}"#)
            .create_async()
            .await;

        let transport = transport_for(&server);
        let err = transport
            .open(serde_json::json!({"question": "hi"}))
            .await
            .err()
            .expect("status error");

        assert_eq!(err, TransportError::status(503, "model overloaded"));
    }

    #[tokio::test]
    async fn test_open_rejects_other_success_codes() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/generate")
            .with_status(204)
            .create_async()
            .await;

        let transport = transport_for(&server);
        let result = transport.open(serde_json::json!({"question": "hi"})).await;
        assert!(matches!(
            result,
            Err(TransportError::Status { status: 204, .. })
        ));
    }

    #[tokio::test]
    async fn test_open_reports_connection_failure() {
        let endpoint = Endpoint::parse("http://127.0.0.1:1/generate").expect("endpoint");
        let transport = HttpTransport::new(endpoint).expect("transport");

        let result = transport.open(serde_json::json!({"question": "hi"})).await;
        assert!(matches!(result, Err(TransportError::Connection(_))));
    }
}
