//! Synchronous rejections raised before any remote call is issued.

use thiserror::Error;

use super::ModemError;
use crate::call::CallState;

/// Why a DTMF string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialStringProblem {
    /// Nothing to send.
    Empty,
    /// Longer than the modem accepts.
    TooLong {
        /// Length of the rejected string.
        length: usize,
    },
    /// A character outside `0-9 * # p w a-d`.
    InvalidCharacter {
        /// Offending character.
        character: char,
        /// Its character index.
        position: usize,
    },
}

/// Errors raised synchronously by an operation, with no request created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocalError {
    /// The interface has not finished connecting.
    #[error("{interface} at {path} is not connected")]
    NotConnected {
        /// Object path of the interface.
        path: String,
        /// Remote interface name.
        interface: &'static str,
    },
    /// The operation is not legal in the call's current state.
    #[error("cannot {operation} a call that is {state}")]
    InvalidTransition {
        /// Rejected operation.
        operation: &'static str,
        /// State the call was in.
        state: CallState,
    },
    /// A DTMF string failed validation.
    #[error("invalid dial string: {problem:?}")]
    InvalidDialString {
        /// What was wrong with it.
        problem: DialStringProblem,
    },
    /// A destination address failed validation.
    #[error("invalid address {address:?}: {source}")]
    InvalidAddress {
        /// Rejected address.
        address: String,
        /// Structured `Call.InvalidAddress` error carrying the reason.
        #[source]
        source: ModemError,
    },
    /// The transport refused to start the remote call.
    #[error("transport refused {method}: {source}")]
    Transport {
        /// Remote method that was refused.
        method: &'static str,
        /// Transport error.
        #[source]
        source: ModemError,
    },
}

impl LocalError {
    pub(crate) fn not_connected(path: &str, interface: &'static str) -> Self {
        Self::NotConnected {
            path: String::from(path),
            interface,
        }
    }

    pub(crate) const fn transition(operation: &'static str, state: CallState) -> Self {
        Self::InvalidTransition { operation, state }
    }

    pub(crate) const fn transport(method: &'static str, source: ModemError) -> Self {
        Self::Transport { method, source }
    }
}
