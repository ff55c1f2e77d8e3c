//! Per-client connection state machine.
//!
//! ```text
//! Disconnected → Connecting → Connected → Disconnected
//!                                       ↘ Closing → Closed
//! ```

use tokio::sync::watch;

/// Lifecycle state of a client's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

impl ConnectionState {
    /// `Closing` and `Closed` are terminal for the client.
    pub fn is_shutdown(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }

    fn can_move_to(self, next: Self) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
                | (Disconnected | Connecting | Connected, Closing)
                | (Closing, Closed)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Owns the state and broadcasts every transition to watchers.
#[derive(Debug)]
pub struct StateCell {
    tx: watch::Sender<ConnectionState>,
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    pub fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Move to `next` if the transition is legal. Returns the previous
    /// state on success.
    pub fn transition(&self, next: ConnectionState) -> Option<ConnectionState> {
        let mut previous = None;
        self.tx.send_if_modified(|state| {
            if state.can_move_to(next) {
                previous = Some(*state);
                *state = next;
                true
            } else {
                false
            }
        });
        match previous {
            Some(from) => tracing::debug!(%from, to = %next, "connection state"),
            None => tracing::trace!(current = %self.get(), rejected = %next, "ignored state transition"),
        }
        previous
    }
}
