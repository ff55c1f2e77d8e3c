//! Request correlator: id allocation, outstanding-request bookkeeping and
//! response matching.
//!
//! Every [`Correlator::submit`] registers a pending entry keyed by its
//! request id and then waits on a single-assignment completion slot. The
//! entry leaves the outstanding set on exactly one of:
//!
//! - a matching response ([`Correlator::on_response`]),
//! - the caller's deadline,
//! - the caller dropping the future (cancellation),
//! - connection loss ([`Correlator::fail_all`]).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{oneshot, Semaphore};
use tokio::time::Instant;

use crate::codec;
use crate::error::{ClientError, TransportError};
use crate::request::{JsonRpcRequest, Response};
use crate::sync::lock;
use crate::transport::Transport;

/// Largest request id put on the wire; allocation wraps back to 1 after it.
///
/// 2^53 - 1 is the largest integer every JSON implementation represents
/// exactly.
pub const MAX_REQUEST_ID: u64 = (1 << 53) - 1;

/// Runs inside the dispatcher, before the caller is woken, when a request
/// succeeds.
pub(crate) type ResultHook = Box<dyn FnOnce(&Value) + Send>;

type Outcome = Result<Value, ClientError>;

/// Deadlines further out than this are clamped to it.
const MAX_WAIT: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout.min(MAX_WAIT)).unwrap_or(now)
}

/// Single-assignment cell a caller awaits.
struct CompletionSlot {
    tx: Option<oneshot::Sender<Outcome>>,
}

impl CompletionSlot {
    fn new() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    fn fulfill(&mut self, id: u64, outcome: Outcome) -> Result<(), ClientError> {
        let Some(tx) = self.tx.take() else {
            tracing::error!(id, "completion slot fulfilled twice");
            return Err(ClientError::Invariant(format!(
                "completion slot for request {id} fulfilled twice"
            )));
        };
        if tx.send(outcome).is_err() {
            tracing::debug!(id, "caller went away before its response arrived");
        }
        Ok(())
    }
}

struct PendingRequest {
    /// Never reused, unlike the wire id.
    seq: u64,
    method: String,
    slot: CompletionSlot,
    on_success: Option<ResultHook>,
}

struct Outstanding {
    accepting: bool,
    next_id: u64,
    max_id: u64,
    next_seq: u64,
    entries: HashMap<u64, PendingRequest>,
}

impl Outstanding {
    /// Next id after the counter that is not currently outstanding.
    fn allocate_id(&mut self) -> u64 {
        loop {
            let id = self.next_id;
            self.next_id = if id >= self.max_id { 1 } else { id + 1 };
            if !self.entries.contains_key(&id) {
                return id;
            }
            tracing::debug!(id, "skipping request id that is still outstanding");
        }
    }
}

/// Matches responses to the requests that produced them.
pub struct Correlator {
    transport: Arc<dyn Transport>,
    outstanding: Mutex<Outstanding>,
    permits: Semaphore,
}

impl Correlator {
    /// Create a correlator sending through `transport`, allowing at most
    /// `max_outstanding` requests in flight.
    pub fn new(transport: Arc<dyn Transport>, max_outstanding: usize) -> Self {
        Self::with_id_limit(transport, max_outstanding, MAX_REQUEST_ID)
    }

    fn with_id_limit(transport: Arc<dyn Transport>, max_outstanding: usize, max_id: u64) -> Self {
        let permits = max_outstanding.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            transport,
            outstanding: Mutex::new(Outstanding {
                accepting: false,
                next_id: 1,
                max_id,
                next_seq: 0,
                entries: HashMap::new(),
            }),
            permits: Semaphore::new(permits),
        }
    }

    /// Start accepting submissions (the connection is up).
    pub fn open(&self) {
        lock(&self.outstanding).accepting = true;
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        lock(&self.outstanding).entries.len()
    }

    /// Returns `true` if `id` is in the outstanding set.
    pub fn is_pending(&self, id: u64) -> bool {
        lock(&self.outstanding).entries.contains_key(&id)
    }

    /// Send `method(params)` and wait for its response or `timeout`.
    pub async fn submit(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value, ClientError> {
        self.submit_with_hook(method, params, timeout, None).await
    }

    pub(crate) async fn submit_with_hook(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Duration,
        on_success: Option<ResultHook>,
    ) -> Result<Value, ClientError> {
        let deadline = deadline_after(timeout);
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let timed_out = || ClientError::Timeout {
            method: method.to_string(),
            ms: timeout_ms,
        };

        let _permit = tokio::time::timeout_at(deadline, self.permits.acquire())
            .await
            .map_err(|_| timed_out())?
            .map_err(|_| ClientError::Invariant("request semaphore closed".into()))?;

        let (id, seq, rx) = self.register(method, on_success)?;
        let _guard = PendingGuard { correlator: self, id, seq };

        let frame = codec::encode(&JsonRpcRequest::new(id, method, params))?;
        tracing::debug!(id, method, bytes = frame.len(), "sending request");

        match tokio::time::timeout_at(deadline, self.transport.send(frame)).await {
            Err(_) => {
                tracing::warn!(id, method, "request timed out while sending");
                return Err(timed_out());
            }
            Ok(Err(TransportError::Timeout(reason))) => {
                tracing::warn!(id, method, reason = %reason, "transport timed out");
                return Err(timed_out());
            }
            Ok(Err(e)) => {
                tracing::warn!(id, method, error = %e, "send failed");
                return Err(e.into());
            }
            Ok(Ok(())) => {}
        }

        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ClientError::Invariant(format!(
                "request {id} dropped without an outcome"
            ))),
            Err(_) => {
                tracing::warn!(id, method, timeout_ms, "request timed out");
                Err(timed_out())
            }
        }
    }

    fn register(
        &self,
        method: &str,
        on_success: Option<ResultHook>,
    ) -> Result<(u64, u64, oneshot::Receiver<Outcome>), ClientError> {
        let mut outstanding = lock(&self.outstanding);
        if !outstanding.accepting {
            return Err(ClientError::Connection("not connected".into()));
        }
        let id = outstanding.allocate_id();
        let seq = outstanding.next_seq;
        outstanding.next_seq += 1;
        let (slot, rx) = CompletionSlot::new();
        outstanding.entries.insert(
            id,
            PendingRequest {
                seq,
                method: method.to_string(),
                slot,
                on_success,
            },
        );
        Ok((id, seq, rx))
    }

    fn remove_if_current(&self, id: u64, seq: u64) {
        let mut outstanding = lock(&self.outstanding);
        if outstanding.entries.get(&id).is_some_and(|p| p.seq == seq) {
            outstanding.entries.remove(&id);
            tracing::debug!(id, "removed abandoned request");
        }
    }

    /// Deliver a response to its waiter.
    ///
    /// Returns `Ok(true)` if a waiter was found, `Ok(false)` if the id was
    /// unknown or already expired (the response is logged and dropped).
    pub fn on_response(&self, response: Response) -> Result<bool, ClientError> {
        let entry = lock(&self.outstanding).entries.remove(&response.id);
        let Some(mut pending) = entry else {
            tracing::warn!(id = response.id, "dropping response for unknown or expired request");
            return Ok(false);
        };

        let outcome = match response.outcome {
            Ok(value) => {
                if let Some(hook) = pending.on_success.take() {
                    hook(&value);
                }
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(id = response.id, method = %pending.method, code = e.code, "rpc error");
                Err(ClientError::Rpc(e))
            }
        };
        pending.slot.fulfill(response.id, outcome)?;
        Ok(true)
    }

    /// Fail one request with `err` (e.g. its response frame was malformed).
    pub fn fail(&self, id: u64, err: ClientError) -> Result<bool, ClientError> {
        let entry = lock(&self.outstanding).entries.remove(&id);
        match entry {
            Some(mut pending) => {
                pending.slot.fulfill(id, Err(err))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stop accepting submissions and fail every outstanding request with
    /// `err`, all under one lock. Returns the number of requests failed.
    pub fn fail_all(&self, err: ClientError) -> usize {
        let drained: Vec<(u64, PendingRequest)> = {
            let mut outstanding = lock(&self.outstanding);
            outstanding.accepting = false;
            outstanding.entries.drain().collect()
        };
        let count = drained.len();
        for (id, mut pending) in drained {
            if let Err(e) = pending.slot.fulfill(id, Err(err.clone())) {
                tracing::error!(id, error = %e, "failed to fail pending request");
            }
        }
        if count > 0 {
            tracing::warn!(count, error = %err, "failed all pending requests");
        }
        count
    }
}

/// Removes a request from the outstanding set when its caller stops
/// waiting, whatever the reason.
struct PendingGuard<'a> {
    correlator: &'a Correlator,
    id: u64,
    seq: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.correlator.remove_if_current(self.id, self.seq);
    }
}
