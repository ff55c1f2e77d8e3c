//! Transport-level and client-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors raised by a [`Transport`](crate::transport::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, non-2xx status, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Unix socket (IPC) connection/send/receive error.
    #[error("IPC error: {0}")]
    Ipc(String),

    /// The transport's own deadline expired before the exchange finished.
    #[error("transport timed out: {0}")]
    Timeout(String),

    /// `send` was called while no connection is open.
    #[error("transport is not connected")]
    NotConnected,

    /// The transport was closed locally.
    #[error("transport closed")]
    Closed,
}

/// Errors surfaced to callers of [`RpcClient`](crate::client::RpcClient).
///
/// The type is `Clone` because a single connection loss fails every
/// pending caller with the same error.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// No response arrived within the deadline. The request was removed
    /// from the outstanding set; the caller may retry.
    #[error("{method} timed out after {ms}ms")]
    Timeout { method: String, ms: u64 },

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// The transport is gone (disconnected, not connected, or closed).
    #[error("connection error: {0}")]
    Connection(String),

    /// A frame could not be parsed or classified.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Internal bookkeeping went wrong (e.g. a completion slot fulfilled twice).
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// The result could not be converted to the requested type.
    #[error("decode error: {0}")]
    Decode(String),

    /// The operation is not available on this transport.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl ClientError {
    /// Returns `true` if the caller may reasonably resend the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this is a node-side execution error.
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }

    /// Returns `true` if the underlying connection is unusable.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        Self::Connection(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
