//! ethwire-http: unary JSON-RPC transport over HTTP(S).
//!
//! One POST per request; subscriptions are not available on this transport.

pub mod client;

pub use client::{HttpTransport, HttpTransportConfig};
