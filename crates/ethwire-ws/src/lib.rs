//! ethwire-ws: duplex JSON-RPC transport over WebSocket.
//!
//! # Features
//! - One long-lived connection multiplexing requests and subscription pushes
//! - Outbound frames serialized through a single writer task
//! - No reconnect of its own; `RpcClient::reconnect` drives new attempts

pub mod client;

pub use client::WsTransport;
