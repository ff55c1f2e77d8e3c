//! The client facade: one transport, one correlator, one subscription
//! registry, and the read loop that feeds them.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::codec::{self, Incoming, ProtocolError};
use crate::config::ClientConfig;
use crate::correlator::{Correlator, ResultHook};
use crate::error::ClientError;
use crate::request::SubscriptionId;
use crate::state::{ConnectionState, StateCell};
use crate::subscriptions::{Subscription, SubscriptionRegistry};
use crate::sync::lock;
use crate::transport::{FrameStream, Transport, TransportKind};

/// Asynchronous JSON-RPC client over any [`Transport`].
///
/// Cloning is cheap; clones share the connection.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use ethwire_core::{ClientConfig, RpcClient, Transport};
/// # async fn demo(transport: Arc<dyn Transport>) -> Result<(), ethwire_core::ClientError> {
/// let client = RpcClient::connect(transport, ClientConfig::default()).await?;
/// let block: String = client.call_as("eth_blockNumber", vec![]).await?;
/// println!("head is {block}");
/// client.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RpcClient {
    shared: Arc<Shared>,
}

struct Shared {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    correlator: Arc<Correlator>,
    registry: Arc<SubscriptionRegistry>,
    state: Arc<StateCell>,
    reader: Mutex<Option<JoinHandle<()>>>,
    /// Serializes connection attempts.
    connecting: tokio::sync::Mutex<()>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let reader = self
            .reader
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = reader {
            handle.abort();
        }
    }
}

impl RpcClient {
    /// Connect `transport` and start the read loop.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let correlator = Arc::new(Correlator::new(
            transport.clone(),
            config.max_outstanding_requests,
        ));
        let registry = Arc::new(SubscriptionRegistry::new(config.notification_channel_capacity));
        let client = Self {
            shared: Arc::new(Shared {
                transport,
                config,
                correlator,
                registry,
                state: Arc::new(StateCell::new()),
                reader: Mutex::new(None),
                connecting: tokio::sync::Mutex::new(()),
            }),
        };
        client.establish().await?;
        Ok(client)
    }

    async fn establish(&self) -> Result<(), ClientError> {
        let shared = &self.shared;
        let _connecting = shared.connecting.lock().await;

        match shared.state.get() {
            ConnectionState::Connected => return Ok(()),
            s if s.is_shutdown() => return Err(ClientError::Connection("client is closed".into())),
            _ => {}
        }

        // A previous read loop may still be finishing its cleanup.
        let previous = lock(&shared.reader).take();
        if let Some(handle) = previous {
            let _ = handle.await;
        }

        if shared.state.transition(ConnectionState::Connecting).is_none() {
            return Err(ClientError::Connection(format!(
                "cannot connect while {}",
                shared.state.get()
            )));
        }

        let url = shared.transport.url().to_string();
        tracing::info!(url = %url, kind = %shared.transport.kind(), "connecting");
        let frames = match shared.transport.connect().await {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "connect failed");
                shared.state.transition(ConnectionState::Disconnected);
                return Err(e.into());
            }
        };

        shared.correlator.open();
        shared.registry.open();
        if shared.state.transition(ConnectionState::Connected).is_none() {
            // close() won the race.
            shared
                .correlator
                .fail_all(ClientError::Connection("client closed".into()));
            shared.registry.close_all("client closed");
            shared.transport.close().await;
            return Err(ClientError::Connection("client closed while connecting".into()));
        }

        let handle = tokio::spawn(read_loop(
            frames,
            shared.correlator.clone(),
            shared.registry.clone(),
            shared.state.clone(),
            url.clone(),
        ));
        *lock(&shared.reader) = Some(handle);
        tracing::info!(url = %url, "connected");
        Ok(())
    }

    /// Make one connection attempt if the client is disconnected.
    ///
    /// Subscriptions from the previous connection are not restored.
    pub async fn reconnect(&self) -> Result<(), ClientError> {
        self.establish().await
    }

    /// Call `method` with the configured default timeout.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, ClientError> {
        self.call_with_timeout(method, params, self.shared.config.request_timeout_default())
            .await
    }

    /// Call `method`, failing with [`ClientError::Timeout`] after `timeout`.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value, ClientError> {
        self.shared.correlator.submit(method, params, timeout).await
    }

    /// Call `method` and deserialize its result.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, ClientError> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| ClientError::Decode(format!("{method}: {e}")))
    }

    /// Open a subscription with `method` (usually `eth_subscribe`).
    ///
    /// The matching unsubscribe method is derived by swapping a trailing
    /// `_subscribe` for `_unsubscribe`.
    pub async fn subscribe(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Subscription, ClientError> {
        let unsubscribe = unsubscribe_method_for(method);
        self.subscribe_with(method, &unsubscribe, params).await
    }

    /// Open a subscription with explicit subscribe and unsubscribe methods.
    pub async fn subscribe_with(
        &self,
        subscribe_method: &str,
        unsubscribe_method: &str,
        params: Vec<Value>,
    ) -> Result<Subscription, ClientError> {
        let shared = &self.shared;
        let kind = shared.transport.kind();
        if !kind.supports_subscriptions() {
            return Err(ClientError::Unsupported(format!(
                "{subscribe_method} needs a duplex transport, {} is {kind}",
                shared.transport.url()
            )));
        }

        let (listener, rx, lost) = shared.registry.listener();
        let hook: ResultHook = {
            let registry = shared.registry.clone();
            let method = subscribe_method.to_string();
            let params = params.clone();
            Box::new(move |result: &Value| {
                if let Some(id) = subscription_id(result) {
                    registry.attach(id, &method, params, listener);
                }
            })
        };

        let timeout = shared.config.request_timeout_default();
        let result = shared
            .correlator
            .submit_with_hook(subscribe_method, params, timeout, Some(hook))
            .await?;
        let id = subscription_id(&result).ok_or_else(|| {
            ClientError::Protocol(format!(
                "{subscribe_method} returned {result} instead of a subscription id"
            ))
        })?;
        tracing::debug!(subscription = %id, method = subscribe_method, "subscribed");

        Ok(Subscription::new(
            id,
            unsubscribe_method,
            rx,
            lost,
            shared.correlator.clone(),
            shared.registry.clone(),
            timeout,
        ))
    }

    /// Fail all pending calls, end all subscriptions and release the
    /// transport. Further calls fail with [`ClientError::Connection`].
    pub async fn close(&self) {
        let shared = &self.shared;
        if shared.state.transition(ConnectionState::Closing).is_none() {
            return;
        }
        tracing::info!(url = %shared.transport.url(), "closing");

        shared
            .correlator
            .fail_all(ClientError::Connection("client closed".into()));
        shared.registry.close_all("client closed");
        shared.transport.close().await;

        let reader = lock(&shared.reader).take();
        if let Some(handle) = reader {
            handle.abort();
            let _ = handle.await;
        }
        shared.state.transition(ConnectionState::Closed);
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Watch connection state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub fn url(&self) -> &str {
        self.shared.transport.url()
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.shared.transport.kind()
    }

    /// Requests currently awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.correlator.pending_count()
    }

    /// Live subscriptions on the current connection.
    pub fn subscription_count(&self) -> usize {
        self.shared.registry.len()
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.url())
            .field("kind", &self.transport_kind())
            .field("state", &self.state())
            .finish()
    }
}

fn unsubscribe_method_for(subscribe_method: &str) -> String {
    match subscribe_method.strip_suffix("_subscribe") {
        Some(namespace) => format!("{namespace}_unsubscribe"),
        None => "eth_unsubscribe".to_string(),
    }
}

fn subscription_id(result: &Value) -> Option<SubscriptionId> {
    match result {
        Value::String(s) => Some(SubscriptionId(s.clone())),
        Value::Number(n) => Some(SubscriptionId(n.to_string())),
        _ => None,
    }
}

/// Reads frames until the connection ends, then invalidates every pending
/// request and subscription.
async fn read_loop(
    mut frames: FrameStream,
    correlator: Arc<Correlator>,
    registry: Arc<SubscriptionRegistry>,
    state: Arc<StateCell>,
    url: String,
) {
    let reason = loop {
        match frames.next().await {
            Some(Ok(frame)) => dispatch(&frame, &correlator, &registry).await,
            Some(Err(e)) => {
                tracing::warn!(url = %url, error = %e, "receive failed");
                break e.to_string();
            }
            None => break "connection closed".to_string(),
        }
    };

    // State first: anyone woken by the teardown below already sees the
    // connection as down. `establish` awaits this task before reconnecting.
    if state.transition(ConnectionState::Disconnected).is_some() {
        tracing::warn!(url = %url, reason = %reason, "disconnected");
    }
    correlator.fail_all(ClientError::Connection(reason.clone()));
    registry.close_all(&reason);
}

async fn dispatch(frame: &[u8], correlator: &Correlator, registry: &SubscriptionRegistry) {
    match codec::parse(frame) {
        Ok(Incoming::Response(response)) => {
            if let Err(e) = correlator.on_response(response) {
                tracing::error!(error = %e, "response dispatch failed");
            }
        }
        Ok(Incoming::Notification(notification)) => {
            registry.dispatch(notification).await;
        }
        Err(ProtocolError::MalformedResponse { id, reason }) => {
            tracing::warn!(id, reason = %reason, "malformed response");
            let err = ClientError::Protocol(format!("malformed response: {reason}"));
            if let Err(e) = correlator.fail(id, err) {
                tracing::error!(error = %e, "response dispatch failed");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, bytes = frame.len(), "dropping unusable frame");
        }
    }
}
