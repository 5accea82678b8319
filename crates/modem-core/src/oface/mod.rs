//! Generic connect/disconnect protocol for a proxy of one remote interface.
//!
//! An [`Oface`] pairs the bookkeeping in [`ConnectionState`] with the
//! interface-specific data and hooks supplied through [`Interface`]. Connecting
//! runs the `start_connect` hook, which subscribes to signals and registers the
//! requests whose replies the proxy needs before it is usable. The proxy is
//! connected once every registered request has completed without error.
//!
//! ```text
//! idle --connect--> connecting --queue drained, no error--> connected
//!   |                   |                                      |
//!   +---disconnect------+--------------------------------------+--> disconnected
//! ```

mod state;

use std::any::Any;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, trace, warn};

pub use self::state::{ConnectionState, Phase};
use crate::errors::{LocalError, ModemError, TransportFault};
use crate::events::{EventQueue, ModemEvent};
use crate::request::Request;
use crate::transport::{
    MethodCall, PropertyBag, Reply, Signal, SignalRule, SubscriptionId, Transport,
};

/// Log target for interface lifecycle events.
pub(crate) const OFACE_TARGET: &str = "modem_core::oface";

/// Interface-specific behaviour plugged into [`Oface`].
pub trait Interface: Sized + 'static {
    /// Remote interface name, e.g. `org.ofono.VoiceCall`.
    const NAME: &'static str;

    /// Maps a remote property name to the local attribute it updates.
    fn map_property(name: &str) -> Option<&'static str>;

    /// Applies a mapped property value.
    fn apply_property(oface: &Oface<Self>, attribute: &'static str, value: &Value);

    /// Subscribes to signals and registers connect requests.
    fn start_connect(oface: &Oface<Self>) {
        oface.connect_properties(true);
    }

    /// Runs once when the interface becomes connected.
    fn on_connected(_oface: &Oface<Self>) {}

    /// Releases what `start_connect` acquired.
    fn start_disconnect(oface: &Oface<Self>) {
        oface.disconnect_properties();
    }
}

struct Shared<I> {
    path: String,
    transport: Rc<dyn Transport>,
    events: EventQueue,
    connection: RefCell<ConnectionState>,
    subscriptions: RefCell<Vec<SubscriptionId>>,
    data: RefCell<I>,
}

/// Shared handle to one interface proxy.
pub struct Oface<I: Interface> {
    shared: Rc<Shared<I>>,
}

/// Non-owning reference to an [`Oface`].
pub struct WeakOface<I: Interface> {
    shared: Weak<Shared<I>>,
}

impl<I: Interface> Oface<I> {
    /// Creates a proxy for the interface at `path`.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        transport: Rc<dyn Transport>,
        events: EventQueue,
        data: I,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                path: path.into(),
                transport,
                events,
                connection: RefCell::new(ConnectionState::default()),
                subscriptions: RefCell::new(Vec::new()),
                data: RefCell::new(data),
            }),
        }
    }

    /// Object path of the remote interface.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.shared.path
    }

    /// Transport the proxy issues calls on.
    #[must_use]
    pub fn transport(&self) -> &Rc<dyn Transport> {
        &self.shared.transport
    }

    /// Queue receiving this proxy's notifications.
    #[must_use]
    pub fn events(&self) -> &EventQueue {
        &self.shared.events
    }

    /// Read access to the interface data.
    ///
    /// The closure must not call back into the proxy mutably.
    pub(crate) fn with<R>(&self, read: impl FnOnce(&I) -> R) -> R {
        read(&self.shared.data.borrow())
    }

    /// Write access to the interface data.
    pub(crate) fn with_mut<R>(&self, write: impl FnOnce(&mut I) -> R) -> R {
        write(&mut self.shared.data.borrow_mut())
    }

    /// Non-owning reference to this proxy.
    #[must_use]
    pub fn downgrade(&self) -> WeakOface<I> {
        WeakOface {
            shared: Rc::downgrade(&self.shared),
        }
    }

    /// Snapshot of the connection bookkeeping.
    #[must_use]
    pub fn connection(&self) -> Ref<'_, ConnectionState> {
        self.shared.connection.borrow()
    }

    /// Returns `true` once connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connection.borrow().is_connected()
    }

    /// Returns `true` while connect requests are outstanding.
    #[must_use]
    pub fn is_connecting(&self) -> bool {
        self.shared.connection.borrow().is_connecting()
    }

    /// Returns `true` after [`Oface::disconnect`].
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.shared.connection.borrow().is_disconnected()
    }

    /// Fails with [`LocalError::NotConnected`] unless connected.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError::NotConnected`] when the proxy is idle,
    /// connecting or disconnected.
    pub fn require_connected(&self) -> Result<(), LocalError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(LocalError::not_connected(self.path(), I::NAME))
        }
    }

    /// Starts connecting.
    ///
    /// Returns `false` without doing anything when the proxy is already
    /// connected, connecting or disconnected.
    #[must_use]
    pub fn connect(&self) -> bool {
        if !self.shared.connection.borrow_mut().begin_connect() {
            return false;
        }
        debug!(target: OFACE_TARGET, path = %self.path(), interface = I::NAME, "connecting");
        I::start_connect(self);
        let idle = !self.is_connecting();
        if idle {
            self.try_connected();
        }
        true
    }

    /// Registers a request the connection waits for.
    pub fn add_connect_request(&self, request: Request) {
        self.shared.connection.borrow_mut().register(request);
    }

    /// Records the completion of a connect request.
    ///
    /// Unknown requests are ignored. When the last outstanding request
    /// completes the connection converges.
    pub fn check_connected(&self, request: &Request, error: Option<&ModemError>) {
        let drained = self.shared.connection.borrow_mut().settle(request, error);
        if drained {
            self.try_connected();
        }
    }

    /// Records an error that makes the current connect attempt fail.
    pub fn set_connecting_error(&self, error: &ModemError) {
        self.shared.connection.borrow_mut().record_error(error);
    }

    fn try_connected(&self) {
        let outcome = self.shared.connection.borrow_mut().try_connected();
        let Some(connected) = outcome else {
            return;
        };
        if connected {
            debug!(target: OFACE_TARGET, path = %self.path(), interface = I::NAME, "connected");
            I::on_connected(self);
        } else {
            let error = self
                .connection()
                .error()
                .map(ToString::to_string)
                .unwrap_or_default();
            warn!(
                target: OFACE_TARGET,
                path = %self.path(),
                interface = I::NAME,
                %error,
                "connect failed"
            );
        }
        self.emit_connected(connected);
    }

    /// Tears the proxy down. Later calls do nothing.
    ///
    /// Pending connect requests are cancelled and a disconnected notification
    /// is emitted only when the proxy had been connected.
    pub fn disconnect(&self) {
        let teardown = self.shared.connection.borrow_mut().begin_disconnect();
        let Some(teardown) = teardown else {
            return;
        };
        debug!(
            target: OFACE_TARGET,
            path = %self.path(),
            interface = I::NAME,
            pending = teardown.pending.len(),
            "disconnecting"
        );
        I::start_disconnect(self);
        self.unsubscribe_all();
        for request in teardown.pending {
            request.cancel();
        }
        if teardown.was_connected {
            self.emit_connected(false);
        }
    }

    fn emit_connected(&self, connected: bool) {
        self.shared.events.push(ModemEvent::Connected {
            path: self.shared.path.clone(),
            interface: I::NAME,
            connected,
        });
    }

    /// Subscribes `handler` to `member` signals of this interface.
    ///
    /// Signals arriving after disconnect or after the proxy is dropped are
    /// ignored.
    pub fn subscribe<F>(&self, member: &'static str, handler: F)
    where
        F: Fn(&Self, &Signal) + 'static,
    {
        let weak = Rc::downgrade(&self.shared);
        let rule = SignalRule::new(self.path(), I::NAME, member);
        let id = self.shared.transport.subscribe(
            rule,
            Rc::new(move |signal: &Signal| {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let oface = Self { shared };
                if !oface.is_disconnected() {
                    handler(&oface, signal);
                }
            }),
        );
        trace!(target: OFACE_TARGET, path = %self.path(), member, id = id.get(), "subscribed");
        self.shared.subscriptions.borrow_mut().push(id);
    }

    /// Drops every signal subscription.
    pub fn unsubscribe_all(&self) {
        let ids: Vec<_> = self.shared.subscriptions.borrow_mut().drain(..).collect();
        for id in ids {
            self.shared.transport.unsubscribe(id);
        }
        self.shared.connection.borrow_mut().set_subscribed(false);
    }

    /// Subscribes to `PropertyChanged` once and optionally fetches every
    /// property as a connect request.
    pub fn connect_properties(&self, get_all: bool) {
        let first = {
            let mut connection = self.shared.connection.borrow_mut();
            let fresh = !connection.is_subscribed();
            connection.set_subscribed(true);
            fresh
        };
        if first {
            self.subscribe("PropertyChanged", |oface, signal| {
                match (signal.str_arg(0), signal.arg_at(1)) {
                    (Some(name), Some(value)) => oface.apply_property_update(name, value),
                    _ => trace!(target: OFACE_TARGET, path = %oface.path(), "malformed PropertyChanged"),
                }
            });
        }
        if !get_all {
            return;
        }
        let issued = self.issue_properties(|oface, request, reply| match reply {
            Ok(properties) => {
                oface.update_properties(&properties);
                oface.check_connected(request, None);
            }
            Err(error) => oface.check_connected(request, Some(&error)),
        });
        match issued {
            Ok(request) => self.add_connect_request(request),
            Err(error) => self.set_connecting_error(&error),
        }
    }

    /// Undoes [`Oface::connect_properties`].
    pub fn disconnect_properties(&self) {
        self.unsubscribe_all();
    }

    /// Issues `method` with `args` on this interface.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError::Transport`] when the transport refuses the call.
    pub fn request<F>(
        &self,
        method: &'static str,
        args: Vec<Value>,
        reply: F,
    ) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, &Request, Reply) + 'static,
    {
        let mut call = MethodCall::new(self.path(), I::NAME, method);
        call.args = args;
        self.request_call(call, reply)
    }

    /// Issues a prepared call, owned by this proxy until teardown.
    ///
    /// Remote exceptions reach `reply` already mapped into the error
    /// taxonomy.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError::Transport`] when the transport refuses the call.
    pub fn request_call<F>(&self, call: MethodCall, reply: F) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, &Request, Reply) + 'static,
    {
        let method = call.method;
        self.issue(call, reply)
            .map_err(|source| LocalError::transport(method, source))
    }

    pub(crate) fn issue<F>(&self, call: MethodCall, reply: F) -> Result<Request, ModemError>
    where
        F: FnOnce(&Self, &Request, Reply) + 'static,
    {
        let owner: Rc<dyn Any> = Rc::clone(&self.shared) as Rc<dyn Any>;
        Request::issue(Some(owner), &self.shared.transport, call, move |request, outcome| {
            let Some(shared) = request.owner::<Shared<I>>() else {
                return;
            };
            reply(&Self { shared }, request, outcome.map_err(ModemError::fixed));
        })
    }

    fn issue_properties<F>(&self, reply: F) -> Result<Request, ModemError>
    where
        F: FnOnce(&Self, &Request, Result<PropertyBag, ModemError>) + 'static,
    {
        let call = MethodCall::new(self.path(), I::NAME, "GetProperties");
        self.issue(call, move |oface, request, outcome| {
            reply(oface, request, outcome.and_then(into_property_bag));
        })
    }

    /// Sets one remote property with `SetProperty`.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError::Transport`] when the transport refuses the call.
    pub fn set_property_request<F>(
        &self,
        name: &str,
        value: Value,
        reply: F,
    ) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, &Request, Reply) + 'static,
    {
        self.request("SetProperty", vec![Value::from(name), value], reply)
    }

    /// Applies every entry of `properties`.
    pub fn update_properties(&self, properties: &PropertyBag) {
        for (name, value) in properties {
            self.apply_property_update(name, value);
        }
    }

    /// Applies one remote property; unmapped names are ignored.
    pub fn apply_property_update(&self, name: &str, value: &Value) {
        match I::map_property(name) {
            Some(attribute) => I::apply_property(self, attribute, value),
            None => trace!(
                target: OFACE_TARGET,
                path = %self.path(),
                property = name,
                "ignoring unmapped property"
            ),
        }
    }
}

fn into_property_bag(value: Value) -> Result<PropertyBag, ModemError> {
    match value {
        Value::Object(properties) => Ok(properties),
        other => Err(ModemError::transport(
            TransportFault::InvalidArgs,
            format!("expected a property map, got {other}"),
        )),
    }
}

impl<I: Interface> WeakOface<I> {
    /// Recovers the proxy if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Oface<I>> {
        self.shared.upgrade().map(|shared| Oface { shared })
    }
}

impl<I: Interface> Clone for Oface<I> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<I: Interface> Clone for WeakOface<I> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<I: Interface> PartialEq for Oface<I> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<I: Interface> Eq for Oface<I> {}

impl<I: Interface> fmt::Debug for Oface<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = self
            .shared
            .connection
            .try_borrow()
            .map(|connection| connection.phase())
            .ok();
        f.debug_struct("Oface")
            .field("interface", &I::NAME)
            .field("path", &self.shared.path)
            .field("phase", &phase)
            .finish_non_exhaustive()
    }
}

impl<I: Interface> fmt::Debug for WeakOface<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakOface")
            .field("interface", &I::NAME)
            .finish_non_exhaustive()
    }
}
