//! Boundary between the engine and the RPC substrate that carries it.
//!
//! The engine never talks to a bus directly. It hands a [`MethodCall`] plus two
//! callbacks to a [`Transport`] and later learns the outcome through them, and
//! it registers [`SignalHandler`]s for the notifications it cares about.
//!
//! A transport must honour this contract:
//!
//! - `begin_call` never invokes either callback before it returns.
//! - For a call that completes, the reply handler runs once and is followed by
//!   the completion notify.
//! - For a cancelled call, the reply handler is dropped without running and the
//!   completion notify still runs, either inside `cancel_call` or later.
//! - Signal handlers run from the event loop, never from inside a call into
//!   the transport.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;

use crate::errors::ModemError;

/// Dynamically typed property bag keyed by remote property name.
pub type PropertyBag = serde_json::Map<String, Value>;

/// Outcome of a remote call.
pub type Reply = Result<Value, ModemError>;

/// Callback receiving a remote call's outcome.
pub type ReplyHandler = Box<dyn FnOnce(Reply)>;

/// Callback the transport runs exactly once when it releases a call.
pub type CompletionNotify = Box<dyn FnOnce()>;

/// Callback invoked for every matching signal.
pub type SignalHandler = Rc<dyn Fn(&Signal)>;

/// Opaque token naming an in-flight call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallToken(u64);

impl CallToken {
    /// Wraps a transport-specific call number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw call number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call#{}", self.0)
    }
}

/// Opaque token naming a signal subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wraps a transport-specific subscription number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw subscription number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// A named remote operation on one object.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    /// Object path the call is addressed to.
    pub path: String,
    /// Remote interface name.
    pub interface: &'static str,
    /// Remote method name.
    pub method: &'static str,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Transport timeout; `None` uses the transport default.
    pub timeout: Option<Duration>,
}

impl MethodCall {
    /// Builds a call with no arguments and the default timeout.
    #[must_use]
    pub fn new(path: impl Into<String>, interface: &'static str, method: &'static str) -> Self {
        Self {
            path: path.into(),
            interface,
            method,
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Replaces the transport timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} on {}", self.interface, self.method, self.path)
    }
}

/// Selects the signals a handler receives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalRule {
    /// Emitting object path.
    pub path: String,
    /// Emitting interface.
    pub interface: &'static str,
    /// Signal member name.
    pub member: &'static str,
}

impl SignalRule {
    /// Builds a rule matching one member of one interface on one object.
    #[must_use]
    pub fn new(path: impl Into<String>, interface: &'static str, member: &'static str) -> Self {
        Self {
            path: path.into(),
            interface,
            member,
        }
    }

    /// Returns `true` when `signal` is selected by this rule.
    #[must_use]
    pub fn matches(&self, signal: &Signal) -> bool {
        self.path == signal.path && self.interface == signal.interface && self.member == signal.member
    }
}

/// An unsolicited notification emitted by a remote object.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Emitting object path.
    pub path: String,
    /// Emitting interface.
    pub interface: String,
    /// Signal member name.
    pub member: String,
    /// Positional arguments.
    pub args: Vec<Value>,
}

impl Signal {
    /// Builds a signal with no arguments.
    #[must_use]
    pub fn new(path: impl Into<String>, interface: &str, member: &str) -> Self {
        Self {
            path: path.into(),
            interface: String::from(interface),
            member: String::from(member),
            args: Vec::new(),
        }
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Argument at `index`, if present.
    #[must_use]
    pub fn arg_at(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// String argument at `index`, if present and a string.
    #[must_use]
    pub fn str_arg(&self, index: usize) -> Option<&str> {
        self.arg_at(index).and_then(Value::as_str)
    }
}

/// The RPC substrate the engine runs on.
pub trait Transport {
    /// Starts `call`; the outcome arrives through `reply` then `notify`.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport cannot accept the call at all, in
    /// which case neither callback will ever run.
    fn begin_call(
        &self,
        call: MethodCall,
        reply: ReplyHandler,
        notify: CompletionNotify,
    ) -> Result<CallToken, ModemError>;

    /// Aborts an in-flight call. Unknown or completed tokens are ignored.
    fn cancel_call(&self, token: CallToken);

    /// Registers `handler` for signals selected by `rule`.
    fn subscribe(&self, rule: SignalRule, handler: SignalHandler) -> SubscriptionId;

    /// Removes a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}
