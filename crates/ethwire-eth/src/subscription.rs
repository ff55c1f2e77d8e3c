use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use ethwire_core::{SubscriptionId, Subscription};
use futures::Stream;
use serde::de::DeserializeOwned;

use crate::error::EthError;

/// A subscription whose payloads are decoded into `T`.
///
/// A payload that does not decode is yielded as [`EthError::Decode`] and the
/// stream continues; connection loss is yielded once as
/// [`EthError::ConnectionLost`] and the stream then ends.
#[derive(Debug)]
pub struct TypedSubscription<T> {
    inner: Subscription,
    _payload: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> TypedSubscription<T> {
    pub fn new(inner: Subscription) -> Self {
        Self { inner, _payload: PhantomData }
    }

    pub fn id(&self) -> &SubscriptionId {
        self.inner.id()
    }

    /// See [`Subscription::unsubscribe`].
    pub async fn unsubscribe(&mut self) -> Result<bool, EthError> {
        Ok(self.inner.unsubscribe().await?)
    }

    /// The untyped subscription.
    pub fn into_inner(self) -> Subscription {
        self.inner
    }
}

impl<T: DeserializeOwned> Stream for TypedSubscription<T> {
    type Item = Result<T, EthError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_next(cx).map(|item| {
            item.map(|payload| match payload {
                Ok(value) => serde_json::from_value(value).map_err(|e| {
                    tracing::warn!(subscription = %this.inner.id(), error = %e, "undecodable subscription payload");
                    EthError::Decode(e.to_string())
                }),
                Err(lost) => Err(lost.into()),
            })
        })
    }
}
