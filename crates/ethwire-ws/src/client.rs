//! WebSocket transport backed by `tokio-tungstenite`.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{future, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use ethwire_core::error::TransportError;
use ethwire_core::transport::{FrameStream, Transport, TransportKind};

/// JSON-RPC over a single WebSocket connection.
///
/// Writes go through a background task that owns the sink; the read half is
/// handed to the caller of [`connect`](Transport::connect) as the inbound
/// frame stream.
pub struct WsTransport {
    url: String,
    writer: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            writer: Mutex::new(None),
        }
    }

    fn writer(&self) -> Option<mpsc::UnboundedSender<Message>> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Duplex
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<FrameStream, TransportError> {
        tracing::info!(url = %self.url, "connecting via WebSocket");
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::WebSocket(format!("connect to {}: {e}", self.url)))?;
        let (mut sink, stream) = ws_stream.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let url = self.url.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    tracing::warn!(url = %url, error = %e, "WS send failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
            tracing::debug!(url = %url, "WS writer stopped");
        });

        let previous = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(tx);
        if let Some(previous) = previous {
            let _ = previous.send(Message::Close(None));
        }

        let frames = stream
            .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(Bytes::from(text))),
                    Ok(Message::Binary(data)) => Some(Ok(Bytes::from(data))),
                    Ok(_) => None,
                    Err(e) => Some(Err(TransportError::WebSocket(e.to_string()))),
                })
            });
        Ok(Box::pin(frames))
    }

    async fn send(&self, frame: Bytes) -> Result<(), TransportError> {
        let writer = self.writer().ok_or(TransportError::NotConnected)?;
        let text = String::from_utf8(frame.to_vec())
            .map_err(|e| TransportError::WebSocket(format!("frame is not UTF-8: {e}")))?;
        writer
            .send(Message::Text(text))
            .map_err(|_| TransportError::WebSocket("connection closed".into()))
    }

    async fn close(&self) {
        let writer = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(writer) = writer {
            tracing::debug!(url = %self.url, "closing WebSocket");
            let _ = writer.send(Message::Close(None));
        }
    }
}
