//! Notifications raised by the engine for the application to consume.
//!
//! Transitions push events onto a shared [`EventQueue`] instead of calling
//! back into application code, so a consumer reacting to an event can freely
//! issue new operations.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::call::{Call, CallState};
use crate::errors::CauseType;

/// One notification.
#[derive(Debug, Clone)]
pub enum ModemEvent {
    /// An interface finished connecting, failed to, or disconnected.
    Connected {
        /// Object path of the interface.
        path: String,
        /// Remote interface name.
        interface: &'static str,
        /// `true` once connected; `false` on failure or disconnect.
        connected: bool,
    },
    /// A terminating call appeared.
    Incoming {
        /// The new call.
        call: Call,
        /// Calling party, empty when withheld.
        remote: String,
    },
    /// An originating call appeared that no local dial accounts for.
    Created {
        /// The new call.
        call: Call,
        /// Called party.
        remote: String,
    },
    /// A call was removed by the remote side.
    Removed {
        /// The call, already disconnected.
        call: Call,
    },
    /// A call changed state.
    CallState {
        /// The call.
        call: Call,
        /// New state.
        state: CallState,
        /// Origin of the last clearing cause.
        cause_type: CauseType,
        /// Last clearing cause code.
        cause: u32,
    },
    /// The remote party put the call on hold or resumed it.
    CallOnHold {
        /// The call.
        call: Call,
        /// `true` when held by the remote party.
        on_hold: bool,
    },
    /// The network supplied a new emergency number list.
    EmergencyNumbers(Vec<String>),
}

/// Shared FIFO of [`ModemEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    inner: Rc<RefCell<VecDeque<ModemEvent>>>,
}

impl EventQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, event: ModemEvent) {
        self.inner.borrow_mut().push_back(event);
    }

    /// Removes and returns the oldest event.
    #[must_use]
    pub fn pop(&self) -> Option<ModemEvent> {
        self.inner.borrow_mut().pop_front()
    }

    /// Removes and returns every queued event, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<ModemEvent> {
        self.inner.borrow_mut().drain(..).collect()
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Returns `true` when no event is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}
