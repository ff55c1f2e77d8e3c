//! Subscription registry and the caller-facing [`Subscription`] stream.
//!
//! The registry maps server-assigned subscription ids to bounded listener
//! channels. The read loop pushes each notification with an awaited send,
//! so a consumer that stops draining its stream stalls the connection until
//! it catches up or unsubscribes.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::correlator::Correlator;
use crate::error::ClientError;
use crate::request::{Notification, SubscriptionId};
use crate::sync::lock;

/// Yielded once, after any buffered payloads, when the connection carrying a
/// subscription goes away.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("subscription lost its connection: {0}")]
pub struct ConnectionLost(pub String);

/// Set once when the connection is lost, read by the stream after its
/// channel drains.
type LostFlag = Arc<OnceLock<String>>;

struct Entry {
    method: String,
    params: Vec<Value>,
    sender: mpsc::Sender<Value>,
    lost: LostFlag,
}

struct Inner {
    accepting: bool,
    entries: HashMap<SubscriptionId, Entry>,
}

/// Listener half created before the subscribe request is sent and attached
/// once the server id is known.
pub(crate) struct PendingListener {
    sender: mpsc::Sender<Value>,
    lost: LostFlag,
}

/// Routes notifications to their subscription streams.
pub struct SubscriptionRegistry {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl SubscriptionRegistry {
    /// Create a registry whose listener channels buffer `capacity` payloads.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                accepting: false,
                entries: HashMap::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Allow registrations (the connection is up).
    pub fn open(&self) {
        lock(&self.inner).accepting = true;
    }

    pub(crate) fn listener(&self) -> (PendingListener, mpsc::Receiver<Value>, LostFlag) {
        let (sender, rx) = mpsc::channel(self.capacity);
        let lost = LostFlag::default();
        (
            PendingListener {
                sender,
                lost: lost.clone(),
            },
            rx,
            lost,
        )
    }

    /// Register `listener` under `id`. Returns `false` if the registry is
    /// closed, in which case the listener is ended as lost.
    pub(crate) fn attach(
        &self,
        id: SubscriptionId,
        method: &str,
        params: Vec<Value>,
        listener: PendingListener,
    ) -> bool {
        let mut inner = lock(&self.inner);
        if !inner.accepting {
            let _ = listener.lost.set("connection closed before subscription was registered".into());
            return false;
        }
        let entry = Entry {
            method: method.to_string(),
            params,
            sender: listener.sender,
            lost: listener.lost,
        };
        if inner.entries.insert(id.clone(), entry).is_some() {
            tracing::warn!(subscription = %id, "server reused a live subscription id; replaced listener");
        }
        tracing::debug!(subscription = %id, method, "subscription registered");
        true
    }

    /// Deliver a notification to its listener, waiting while the listener's
    /// channel is full.
    ///
    /// Returns `false` if the id is unknown or the listener has gone away (its
    /// entry is then removed).
    pub async fn dispatch(&self, notification: Notification) -> bool {
        let Notification {
            subscription_id,
            payload,
        } = notification;

        let sender = lock(&self.inner)
            .entries
            .get(&subscription_id)
            .map(|e| e.sender.clone());
        let Some(sender) = sender else {
            tracing::warn!(subscription = %subscription_id, "dropping notification for unknown subscription");
            return false;
        };

        if sender.send(payload).await.is_ok() {
            return true;
        }

        let mut inner = lock(&self.inner);
        if inner
            .entries
            .get(&subscription_id)
            .is_some_and(|e| e.sender.same_channel(&sender))
        {
            inner.entries.remove(&subscription_id);
            tracing::debug!(subscription = %subscription_id, "listener gone; removed subscription");
        }
        false
    }

    /// Remove the entry for `id`. Returns `true` if one existed.
    pub fn remove(&self, id: &SubscriptionId) -> bool {
        lock(&self.inner).entries.remove(id).is_some()
    }

    /// Stop accepting registrations and end every listener with
    /// [`ConnectionLost`]. Returns the number of subscriptions ended.
    pub fn close_all(&self, reason: &str) -> usize {
        let drained: Vec<(SubscriptionId, Entry)> = {
            let mut inner = lock(&self.inner);
            inner.accepting = false;
            inner.entries.drain().collect()
        };
        let count = drained.len();
        for (id, entry) in drained {
            let _ = entry.lost.set(reason.to_string());
            tracing::debug!(subscription = %id, method = %entry.method, "subscription ended by connection loss");
            drop(entry.sender);
        }
        if count > 0 {
            tracing::warn!(count, reason, "ended all subscriptions");
        }
        count
    }

    /// Ids, methods and params of every live subscription.
    pub fn active_subscriptions(&self) -> Vec<(SubscriptionId, String, Vec<Value>)> {
        lock(&self.inner)
            .entries
            .iter()
            .map(|(id, e)| (id.clone(), e.method.clone(), e.params.clone()))
            .collect()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    /// Returns `true` if there are no live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A live server subscription.
///
/// Yields payloads in arrival order. When the connection is lost the stream
/// yields one `Err(ConnectionLost)` after the buffered payloads and then
/// ends. Dropping the handle without calling [`unsubscribe`](Self::unsubscribe)
/// leaves the server-side subscription running; the local entry is cleaned
/// up on its next notification.
pub struct Subscription {
    id: SubscriptionId,
    unsubscribe_method: String,
    rx: mpsc::Receiver<Value>,
    lost: LostFlag,
    finished: bool,
    unsubscribed: bool,
    correlator: Arc<Correlator>,
    registry: Arc<SubscriptionRegistry>,
    timeout: Duration,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("finished", &self.finished)
            .field("unsubscribed", &self.unsubscribed)
            .finish()
    }
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        unsubscribe_method: &str,
        rx: mpsc::Receiver<Value>,
        lost: LostFlag,
        correlator: Arc<Correlator>,
        registry: Arc<SubscriptionRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            id,
            unsubscribe_method: unsubscribe_method.to_string(),
            rx,
            lost,
            finished: false,
            unsubscribed: false,
            correlator,
            registry,
            timeout,
        }
    }

    /// The server-assigned subscription id.
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Cancel the subscription on the server and end the stream.
    ///
    /// The local entry is removed whatever the server answers. Calling this
    /// again, or after the connection was lost, returns `Ok(false)` without
    /// touching the network.
    pub async fn unsubscribe(&mut self) -> Result<bool, ClientError> {
        if self.unsubscribed {
            return Ok(false);
        }
        self.unsubscribed = true;
        self.finished = true;
        // Closing first releases a read loop blocked on this channel.
        self.rx.close();

        if self.lost.get().is_some() {
            self.registry.remove(&self.id);
            return Ok(false);
        }

        let outcome = self
            .correlator
            .submit(
                &self.unsubscribe_method,
                vec![Value::String(self.id.0.clone())],
                self.timeout,
            )
            .await;
        self.registry.remove(&self.id);

        match outcome {
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            Err(e) => {
                tracing::warn!(subscription = %self.id, error = %e, "unsubscribe request failed");
                Err(e)
            }
        }
    }
}

impl Stream for Subscription {
    type Item = Result<Value, ConnectionLost>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(payload)) => Poll::Ready(Some(Ok(payload))),
            Poll::Ready(None) => {
                this.finished = true;
                match this.lost.get() {
                    Some(reason) => Poll::Ready(Some(Err(ConnectionLost(reason.clone())))),
                    None => Poll::Ready(None),
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
