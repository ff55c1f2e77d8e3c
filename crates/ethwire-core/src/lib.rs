//! ethwire-core: transport-agnostic JSON-RPC dispatch for Ethereum clients.
//!
//! # Overview
//!
//! One [`RpcClient`] owns one [`Transport`] and multiplexes everything that
//! travels over it:
//!
//! - [`Transport`]: the byte-level async trait every connection kind implements
//! - [`codec`]: request encoding and inbound frame classification
//! - [`Correlator`]: request ids, outstanding requests, per-call timeouts
//! - [`SubscriptionRegistry`] / [`Subscription`]: server push routed to streams
//! - [`ConnectionState`]: observable connection lifecycle
//! - [`memory`]: an in-process transport for tests

pub mod client;
pub mod codec;
pub mod config;
pub mod correlator;
pub mod error;
pub mod memory;
pub mod quantity;
pub mod request;
pub mod state;
pub mod subscriptions;
mod sync;
pub mod transport;

pub use client::RpcClient;
pub use codec::{Incoming, ProtocolError};
pub use config::ClientConfig;
pub use correlator::{Correlator, MAX_REQUEST_ID};
pub use error::{ClientError, TransportError};
pub use request::{JsonRpcError, JsonRpcRequest, Notification, Response, RpcParam, SubscriptionId};
pub use state::ConnectionState;
pub use subscriptions::{ConnectionLost, Subscription, SubscriptionRegistry};
pub use transport::{FrameStream, Transport, TransportKind};
