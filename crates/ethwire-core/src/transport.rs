//! The `Transport` trait: the byte-level abstraction every connection kind implements.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::TransportError;

/// Inbound frames for one connection. Ends when the connection closes;
/// a new stream is obtained by calling [`Transport::connect`] again.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// How frames map onto physical exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// One physical exchange per request (HTTP). No server push.
    Unary,
    /// One persistent connection multiplexing requests and notifications.
    Duplex,
}

impl TransportKind {
    pub fn supports_subscriptions(self) -> bool {
        matches!(self, Self::Duplex)
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unary => write!(f, "unary"),
            Self::Duplex => write!(f, "duplex"),
        }
    }
}

/// The central async trait every transport must implement.
///
/// Transports move opaque frames; they never parse JSON and never
/// reconnect on their own.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn Transport>`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The transport variant.
    fn kind(&self) -> TransportKind;

    /// Return the transport's identifier (URL or socket path).
    fn url(&self) -> &str;

    /// Open a connection and return its inbound frame stream.
    ///
    /// Calling `connect` again replaces the previous connection.
    async fn connect(&self) -> Result<FrameStream, TransportError>;

    /// Send one frame on the current connection.
    ///
    /// For unary transports this performs the whole exchange and queues the
    /// reply on the inbound stream before returning.
    async fn send(&self, frame: Bytes) -> Result<(), TransportError>;

    /// Release the connection. The inbound stream ends shortly afterwards.
    async fn close(&self);
}
