//! Unary HTTP transport backed by `reqwest`.
//!
//! Each frame is one POST. The response body is queued on the inbound
//! stream so that responses reach the client through the same dispatch
//! path as on duplex transports.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use ethwire_core::codec::{self, Incoming, ProtocolError};
use ethwire_core::error::TransportError;
use ethwire_core::transport::{FrameStream, Transport, TransportKind};

type InboundTx = mpsc::UnboundedSender<Result<Bytes, TransportError>>;

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransportConfig {
    /// Hard cap on each POST, on top of the caller's request timeout.
    /// `None` leaves the deadline to the caller.
    pub request_timeout: Option<Duration>,
    /// Extra headers sent with every request (e.g. an API key).
    pub headers: Vec<(String, String)>,
}

fn http_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else {
        TransportError::Http(e.to_string())
    }
}

/// Whether an error-status body is still a JSON-RPC response that the
/// dispatcher can route to its caller.
fn carries_response(body: &[u8]) -> bool {
    matches!(
        codec::parse(body),
        Ok(Incoming::Response(_)) | Err(ProtocolError::MalformedResponse { .. })
    )
}

/// JSON-RPC over HTTP POST.
pub struct HttpTransport {
    url: String,
    http: reqwest::Client,
    inbound: Mutex<Option<InboundTx>>,
}

impl HttpTransport {
    /// Create a transport for the given endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpTransportConfig) -> Result<Self, TransportError> {
        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in &config.headers {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Http(format!("invalid header name {name:?}: {e}")))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| TransportError::Http(format!("invalid header value for {name}: {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| TransportError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            inbound: Mutex::new(None),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpTransportConfig::default())
    }

    fn inbound(&self) -> Result<InboundTx, TransportError> {
        self.inbound
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or(TransportError::NotConnected)
    }

    async fn post(&self, frame: Bytes) -> Result<Bytes, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(frame)
            .send()
            .await
            .map_err(http_error)?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(http_error)?;
        if status.is_success() || carries_response(&body) {
            if !status.is_success() {
                tracing::debug!(url = %self.url, %status, "JSON-RPC response with error status");
            }
            return Ok(body);
        }
        Err(TransportError::Http(format!(
            "HTTP {}: {}",
            status.as_u16(),
            String::from_utf8_lossy(&body)
        )))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Unary
    }

    fn url(&self) -> &str {
        &self.url
    }

    /// HTTP has no connection to open; this only creates the stream that
    /// response bodies are queued on.
    async fn connect(&self) -> Result<FrameStream, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self
            .inbound
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(tx);
        tracing::debug!(url = %self.url, "HTTP transport ready");
        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        })))
    }

    async fn send(&self, frame: Bytes) -> Result<(), TransportError> {
        let inbound = self.inbound()?;
        let body = self.post(frame).await.map_err(|e| {
            tracing::warn!(url = %self.url, error = %e, "HTTP request failed");
            e
        })?;
        if body.is_empty() {
            tracing::debug!(url = %self.url, "empty HTTP response body");
            return Ok(());
        }
        inbound.send(Ok(body)).map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        self.inbound
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
    }
}
