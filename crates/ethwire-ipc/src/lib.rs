//! ethwire-ipc: duplex JSON-RPC transport over a Unix domain socket.
//!
//! Frames are newline-delimited JSON, as served by geth's `.ipc` endpoint.

#[cfg(unix)]
pub mod client;

#[cfg(unix)]
pub use client::IpcTransport;
