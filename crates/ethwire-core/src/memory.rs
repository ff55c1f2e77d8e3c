//! In-process transport with a scripted server end.
//!
//! [`MemoryTransport`] behaves like a real connection from the client's
//! point of view: `connect` opens a fresh inbound stream, `send` hands the
//! frame to the paired [`MemoryServer`], and closing or disconnecting ends
//! the stream. The server end reads decoded requests and pushes responses,
//! notifications or raw frames back.
//!
//! Delivery is deterministic and nothing is dropped while connected.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::codec;
use crate::error::TransportError;
use crate::request::JsonRpcRequest;
use crate::sync::lock;
use crate::transport::{FrameStream, Transport, TransportKind};

type InboundTx = mpsc::UnboundedSender<Result<Bytes, TransportError>>;

struct Link {
    inbound: Mutex<Option<InboundTx>>,
    requests: mpsc::UnboundedSender<Bytes>,
    connects: AtomicUsize,
    refuse: AtomicBool,
}

/// Client end of an in-memory connection.
pub struct MemoryTransport {
    kind: TransportKind,
    link: Arc<Link>,
}

/// Server end of an in-memory connection.
pub struct MemoryServer {
    link: Arc<Link>,
    requests: mpsc::UnboundedReceiver<Bytes>,
}

impl MemoryTransport {
    /// A duplex pair: the server may push notifications at any time.
    pub fn duplex() -> (Self, MemoryServer) {
        Self::pair(TransportKind::Duplex)
    }

    /// A unary pair. Only the request/response surface is meaningful.
    pub fn unary() -> (Self, MemoryServer) {
        Self::pair(TransportKind::Unary)
    }

    fn pair(kind: TransportKind) -> (Self, MemoryServer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let link = Arc::new(Link {
            inbound: Mutex::new(None),
            requests: tx,
            connects: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
        });
        (
            Self {
                kind,
                link: link.clone(),
            },
            MemoryServer { link, requests: rx },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn url(&self) -> &str {
        "memory://"
    }

    async fn connect(&self) -> Result<FrameStream, TransportError> {
        if self.link.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.link.inbound) = Some(tx);
        self.link.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        })))
    }

    async fn send(&self, frame: Bytes) -> Result<(), TransportError> {
        if lock(&self.link.inbound).is_none() {
            return Err(TransportError::NotConnected);
        }
        self.link
            .requests
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        lock(&self.link.inbound).take();
    }
}

impl MemoryServer {
    /// Next raw frame sent by the client.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        self.requests.recv().await
    }

    /// Next request sent by the client. Frames that do not decode as a
    /// request are skipped.
    pub async fn next_request(&mut self) -> Option<JsonRpcRequest> {
        while let Some(frame) = self.requests.recv().await {
            match codec::parse_request(&frame) {
                Ok(req) => return Some(req),
                Err(e) => tracing::warn!(error = %e, "memory server skipped undecodable frame"),
            }
        }
        None
    }

    /// Push a raw frame to the client. Returns `false` if not connected.
    pub fn push(&self, frame: impl Into<Bytes>) -> bool {
        match lock(&self.link.inbound).as_ref() {
            Some(tx) => tx.send(Ok(frame.into())).is_ok(),
            None => false,
        }
    }

    /// Push a JSON value as one frame.
    pub fn push_json(&self, value: &Value) -> bool {
        self.push(value.to_string())
    }

    /// Answer request `id` with `result`.
    pub fn respond(&self, id: u64, result: Value) -> bool {
        self.push_json(&json!({ "jsonrpc": "2.0", "id": id, "result": result }))
    }

    /// Answer request `id` with a JSON-RPC error.
    pub fn respond_error(&self, id: u64, code: i64, message: &str) -> bool {
        self.push_json(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message },
        }))
    }

    /// Push an `eth_subscription` notification.
    pub fn notify(&self, subscription: &str, result: Value) -> bool {
        self.push_json(&json!({
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": { "subscription": subscription, "result": result },
        }))
    }

    /// Deliver a transport error on the inbound stream, then end it.
    pub fn fail(&self, error: TransportError) {
        if let Some(tx) = lock(&self.link.inbound).take() {
            let _ = tx.send(Err(error));
        }
    }

    /// End the current connection from the server side.
    pub fn disconnect(&self) {
        lock(&self.link.inbound).take();
    }

    /// Make subsequent `connect` calls fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.link.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of successful `connect` calls so far.
    pub fn connect_count(&self) -> usize {
        self.link.connects.load(Ordering::SeqCst)
    }

    /// Returns `true` while a client connection is open.
    pub fn is_connected(&self) -> bool {
        lock(&self.link.inbound).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (transport, mut server) = MemoryTransport::duplex();
        let mut inbound = transport.connect().await.unwrap();

        let req = JsonRpcRequest::new(1, "eth_chainId", vec![]);
        transport.send(codec::encode(&req).unwrap()).await.unwrap();
        assert_eq!(server.next_request().await.unwrap(), req);

        assert!(server.respond(1, json!("0x1")));
        let frame = inbound.next().await.unwrap().unwrap();
        assert!(std::str::from_utf8(&frame).unwrap().contains("\"result\":\"0x1\""));
    }

    #[tokio::test]
    async fn disconnect_ends_stream() {
        let (transport, server) = MemoryTransport::duplex();
        let mut inbound = transport.connect().await.unwrap();
        server.disconnect();
        assert!(inbound.next().await.is_none());
        assert!(matches!(
            transport.send(Bytes::from_static(b"{}")).await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn refused_connections() {
        let (transport, server) = MemoryTransport::unary();
        server.refuse_connections(true);
        assert!(transport.connect().await.is_err());
        server.refuse_connections(false);
        assert!(transport.connect().await.is_ok());
        assert_eq!(server.connect_count(), 1);
        assert_eq!(transport.kind(), TransportKind::Unary);
    }
}
