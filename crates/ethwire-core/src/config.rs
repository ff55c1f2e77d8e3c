//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for one [`RpcClient`](crate::client::RpcClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Endpoint the transport connects to, e.g. "wss://eth.example.org" or
    /// "/var/run/geth.ipc".
    #[serde(default)]
    pub endpoint_url: String,
    /// Timeout applied to calls that do not pass their own, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_default_ms: u64,
    /// Upper bound on requests awaiting a response at the same time.
    #[serde(default = "default_max_outstanding_requests")]
    pub max_outstanding_requests: usize,
    /// Payloads buffered per subscription before the read loop waits.
    #[serde(default = "default_notification_channel_capacity")]
    pub notification_channel_capacity: usize,
}

fn default_request_timeout_ms() -> u64 { 60_000 }
fn default_max_outstanding_requests() -> usize { 1_024 }
fn default_notification_channel_capacity() -> usize { 256 }

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            request_timeout_default_ms: default_request_timeout_ms(),
            max_outstanding_requests: default_max_outstanding_requests(),
            notification_channel_capacity: default_notification_channel_capacity(),
        }
    }
}

impl ClientConfig {
    /// Default settings for `endpoint_url`.
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout_default(&self) -> Duration {
        Duration::from_millis(self.request_timeout_default_ms)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_default_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_outstanding_requests(mut self, n: usize) -> Self {
        self.max_outstanding_requests = n;
        self
    }

    pub fn with_notification_channel_capacity(mut self, n: usize) -> Self {
        self.notification_channel_capacity = n;
        self
    }
}
