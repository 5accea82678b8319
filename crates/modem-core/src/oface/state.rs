//! Bookkeeping half of the interface connection state machine.

use std::collections::VecDeque;

use crate::errors::ModemError;
use crate::request::Request;

/// Where an interface is in its connect/disconnect lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not connected and nothing pending.
    Idle,
    /// Connect requests are outstanding.
    Connecting,
    /// Connected.
    Connected,
    /// Terminal.
    Disconnected,
}

/// Requests cancelled and flags captured when disconnecting.
#[derive(Debug)]
pub(crate) struct Teardown {
    pub(crate) was_connected: bool,
    pub(crate) pending: Vec<Request>,
}

/// Per-interface connection bookkeeping.
#[derive(Debug, Default)]
pub struct ConnectionState {
    connected: bool,
    disconnected: bool,
    pending: VecDeque<Request>,
    error: Option<ModemError>,
    subscribed: bool,
}

impl ConnectionState {
    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.disconnected {
            Phase::Disconnected
        } else if self.connected {
            Phase::Connected
        } else if self.pending.is_empty() {
            Phase::Idle
        } else {
            Phase::Connecting
        }
    }

    /// Returns `true` once connected.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns `true` after disconnect.
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Returns `true` while connect requests are outstanding.
    #[must_use]
    pub fn is_connecting(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Error accumulated by the current or last connect attempt.
    #[must_use]
    pub const fn error(&self) -> Option<&ModemError> {
        self.error.as_ref()
    }

    /// Number of outstanding connect requests.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Starts a connect attempt; `false` when connect must be a no-op.
    pub(crate) fn begin_connect(&mut self) -> bool {
        if self.connected || self.disconnected || self.is_connecting() {
            return false;
        }
        self.error = None;
        true
    }

    pub(crate) fn register(&mut self, request: Request) {
        self.pending.push_back(request);
    }

    /// Removes `request`; `true` when that emptied the queue.
    pub(crate) fn settle(&mut self, request: &Request, error: Option<&ModemError>) -> bool {
        let Some(position) = self.pending.iter().position(|queued| queued == request) else {
            return false;
        };
        drop(self.pending.remove(position));
        if let Some(error) = error {
            self.record_error(error);
        }
        self.pending.is_empty()
    }

    /// Keeps an existing interface error over a later transport error.
    pub(crate) fn record_error(&mut self, error: &ModemError) {
        let replace = self.error.as_ref().is_none_or(ModemError::is_transport);
        if replace {
            self.error = Some(error.clone());
        }
    }

    /// Converges the attempt; `Some(outcome)` when a transition happened.
    pub(crate) fn try_connected(&mut self) -> Option<bool> {
        if self.connected || self.disconnected {
            return None;
        }
        self.connected = self.error.is_none();
        Some(self.connected)
    }

    /// Enters the terminal state; `None` when already there.
    pub(crate) fn begin_disconnect(&mut self) -> Option<Teardown> {
        if self.disconnected {
            return None;
        }
        let was_connected = self.connected;
        self.disconnected = true;
        self.connected = false;
        Some(Teardown {
            was_connected,
            pending: self.pending.drain(..).collect(),
        })
    }

    pub(crate) const fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub(crate) const fn set_subscribed(&mut self, subscribed: bool) {
        self.subscribed = subscribed;
    }
}
