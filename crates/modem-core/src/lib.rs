//! Request and connection-lifecycle engine for modem voice calls.
//!
//! The engine talks to a remote telephony service through a [`Transport`]
//! the embedding process supplies. Every remote operation returns a
//! cancellable [`Request`]; every remote interface is proxied by an
//! [`oface::Oface`] that converges from idle to connected once all of its
//! connect requests have completed. On top of that sit the voice call
//! proxies: [`CallService`] owns the calls of one modem and [`Call`] models a
//! single call leg.
//!
//! # Architecture
//!
//! - [`request`] tracks one in-flight remote call together with keyed
//!   attachments, destructors and an optional cancel override.
//! - [`errors`] maps remote exception names onto structured codes in the
//!   telephony, call, call network and message domains.
//! - [`oface`] implements the connect, converge and disconnect state machine
//!   shared by every proxy.
//! - [`call`] holds the per-call state machine, address validation, DTMF
//!   handling and tone selection.
//! - [`service`] is the registry: the dial FIFO, deferred announcement of
//!   originating calls, and the active and held slots.
//! - [`events`] carries notifications to the application through an
//!   [`EventQueue`] instead of re-entrant callbacks.
//! - [`bootstrap`] loads configuration through `ortho_config`, installs
//!   `tracing` output and builds registries.
//!
//! Everything is single-threaded: handles are reference counted and a
//! transport must never complete a call from inside `begin_call`.

pub mod bootstrap;
pub mod call;
pub mod errors;
pub mod events;
pub mod oface;
pub mod request;
pub mod service;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Engine, SystemConfigLoader, bootstrap, bootstrap_with,
};
pub use call::{Call, CallState, ClirOverride, Tone};
pub use errors::{ErrorCode, ErrorDomain, LocalError, ModemError};
pub use events::{EventQueue, ModemEvent};
pub use request::{Request, RequestId};
pub use service::{CallService, CallServiceOptions};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};
pub use transport::Transport;

#[cfg(test)]
mod tests;
