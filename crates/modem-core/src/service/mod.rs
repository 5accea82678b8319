//! Registry of the calls on one modem.
//!
//! [`CallService`] proxies `org.ofono.VoiceCallManager`. It owns every
//! [`Call`] instance keyed by object path, serialises dial requests through a
//! FIFO, and tracks which non-conference call currently holds the active and
//! held slots.
//!
//! # Dial ordering
//!
//! An originating call can be announced by `CallAdded` before the `Dial` reply
//! that created it arrives. While any dial is outstanding, originating calls
//! are parked on a creation FIFO instead of being announced. A dial reply
//! claims its own call from that FIFO; once no dial remains, the calls still
//! parked there are announced as [`ModemEvent::Created`] in arrival order.

mod options;

use std::collections::{BTreeMap, VecDeque};
use std::mem;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, info, trace, warn};

pub use self::options::CallServiceOptions;
use crate::call::{
    Call, CallState, ClirOverride, Direction, emergency_service, path_list, validate_address,
};
use crate::errors::{CauseType, LocalError, ModemError, TransportFault};
use crate::events::{EventQueue, ModemEvent};
use crate::oface::{Interface, Oface};
use crate::request::{Request, RequestId};
use crate::transport::{MethodCall, PropertyBag, Signal, Transport};

/// Log target for registry events.
pub(crate) const SERVICE_TARGET: &str = "modem_core::service";

const DESTINATION_KEY: &str = "call-destination";
const CANCELED_KEY: &str = "call-canceled";

#[derive(Debug)]
pub(crate) struct CallManager {
    options: CallServiceOptions,
    instances: BTreeMap<String, Call>,
    dialing: VecDeque<Request>,
    created: VecDeque<Call>,
    active: Option<Call>,
    held: Option<Call>,
    network_numbers: Option<Vec<String>>,
}

impl CallManager {
    fn emergency_numbers(&self) -> Vec<String> {
        self.network_numbers
            .clone()
            .unwrap_or_else(|| self.options.emergency_numbers.clone())
    }

    fn vacate(&mut self, call: &Call) {
        if self.active.as_ref() == Some(call) {
            self.active = None;
        }
        if self.held.as_ref() == Some(call) {
            self.held = None;
        }
    }
}

impl Interface for CallManager {
    const NAME: &'static str = "org.ofono.VoiceCallManager";

    fn map_property(name: &str) -> Option<&'static str> {
        (name == "EmergencyNumbers").then_some("emergency-numbers")
    }

    fn apply_property(oface: &Oface<Self>, attribute: &'static str, value: &Value) {
        if attribute != "emergency-numbers" {
            return;
        }
        let Ok(numbers) = path_list(value) else {
            warn!(target: SERVICE_TARGET, %value, "ignoring malformed EmergencyNumbers");
            return;
        };
        debug!(target: SERVICE_TARGET, count = numbers.len(), "emergency numbers updated");
        oface.with_mut(|manager| manager.network_numbers = Some(numbers.clone()));
        if oface.is_connected() {
            oface.events().push(ModemEvent::EmergencyNumbers(numbers));
        }
    }

    fn start_connect(oface: &Oface<Self>) {
        let service_name = oface.with(|manager| manager.options.service_name.clone());
        debug!(target: SERVICE_TARGET, path = %oface.path(), service = %service_name, "connecting call manager");

        oface.connect_properties(true);
        oface.subscribe("CallAdded", |oface, signal| {
            CallService::from_oface(oface.clone()).on_call_added(signal);
        });
        oface.subscribe("CallRemoved", |oface, signal| {
            if let Some(path) = signal.str_arg(0) {
                CallService::from_oface(oface.clone()).remove_instance(path);
            }
        });

        let call = MethodCall::new(oface.path(), Self::NAME, "GetCalls");
        let issued = oface.issue(call, |oface, request, reply| {
            let service = CallService::from_oface(oface.clone());
            match reply {
                Ok(calls) => {
                    service.adopt_calls(&calls);
                    oface.check_connected(request, None);
                }
                Err(error) => oface.check_connected(request, Some(&error)),
            }
        });
        match issued {
            Ok(request) => oface.add_connect_request(request),
            Err(error) => oface.set_connecting_error(&error),
        }
    }

    fn start_disconnect(oface: &Oface<Self>) {
        oface.disconnect_properties();
        let (dials, calls) = oface.with_mut(|manager| {
            manager.active = None;
            manager.held = None;
            manager.created.clear();
            (
                manager.dialing.drain(..).collect::<Vec<_>>(),
                mem::take(&mut manager.instances),
            )
        });
        debug!(
            target: SERVICE_TARGET,
            dials = dials.len(),
            calls = calls.len(),
            "tearing down call registry"
        );
        for request in dials {
            request.abort();
        }
        for call in calls.into_values() {
            call.disconnect();
        }
    }
}

/// Cancel override of a dial: the reply still arrives and releases the call.
///
/// Re-arms itself so a repeated cancel never aborts the dial.
fn mark_dial_canceled(request: &Request) {
    trace!(target: SERVICE_TARGET, id = %request.id(), "dial marked canceled");
    request.add_attachment(CANCELED_KEY, true);
    request.add_cancel_override(mark_dial_canceled);
}

/// Shared handle to the call registry of one modem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallService(Oface<CallManager>);

impl CallService {
    /// Creates a registry for the modem at `path`.
    ///
    /// Nothing is sent until [`CallService::connect`] is called.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        transport: Rc<dyn Transport>,
        events: EventQueue,
        options: CallServiceOptions,
    ) -> Self {
        let manager = CallManager {
            options,
            instances: BTreeMap::new(),
            dialing: VecDeque::new(),
            created: VecDeque::new(),
            active: None,
            held: None,
            network_numbers: None,
        };
        Self(Oface::new(path, transport, events, manager))
    }

    pub(crate) const fn from_oface(oface: Oface<CallManager>) -> Self {
        Self(oface)
    }

    /// Object path of the modem.
    #[must_use]
    pub fn path(&self) -> &str {
        self.0.path()
    }

    /// Queue receiving the registry's notifications.
    #[must_use]
    pub fn events(&self) -> &EventQueue {
        self.0.events()
    }

    /// Starts connecting; see [`Oface::connect`].
    #[must_use]
    pub fn connect(&self) -> bool {
        self.0.connect()
    }

    /// Tears the registry down, cancelling dials and dropping every call.
    pub fn disconnect(&self) {
        self.0.disconnect();
    }

    /// Returns `true` once connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.0.is_connected()
    }

    /// Returns `true` while connect requests are outstanding.
    #[must_use]
    pub fn is_connecting(&self) -> bool {
        self.0.is_connecting()
    }

    /// Every live call, ordered by path.
    #[must_use]
    pub fn get_calls(&self) -> Vec<Call> {
        self.0
            .with(|manager| manager.instances.values().cloned().collect())
    }

    /// The call at `path`, if known.
    #[must_use]
    pub fn get_call(&self, path: &str) -> Option<Call> {
        self.0.with(|manager| manager.instances.get(path).cloned())
    }

    /// The non-conference call in [`CallState::Active`], if any.
    #[must_use]
    pub fn active_call(&self) -> Option<Call> {
        self.0.with(|manager| manager.active.clone())
    }

    /// The non-conference call in [`CallState::Held`], if any.
    #[must_use]
    pub fn held_call(&self) -> Option<Call> {
        self.0.with(|manager| manager.held.clone())
    }

    /// Number of dials awaiting a reply.
    #[must_use]
    pub fn pending_dials(&self) -> usize {
        self.0.with(|manager| manager.dialing.len())
    }

    /// Current emergency number list.
    ///
    /// The network's list once received; the configured list before that.
    #[must_use]
    pub fn emergency_numbers(&self) -> Vec<String> {
        self.0.with(CallManager::emergency_numbers)
    }

    /// Emergency service `destination` reaches, if any.
    #[must_use]
    pub fn emergency_service(&self, destination: &str) -> Option<String> {
        let numbers = self.emergency_numbers();
        emergency_service(destination, &numbers).map(String::from)
    }

    // --------------------------------------------------------------------
    // Instances
    // --------------------------------------------------------------------

    /// Returns the call at `path`, creating it from `properties` if new.
    ///
    /// A new call is classified by its initial state: incoming and waiting
    /// calls are terminating, dialing, alerting, active and held calls are
    /// originating. Calls first seen invalid or disconnected are not
    /// registered.
    #[must_use]
    pub fn ensure_instance(&self, path: &str, properties: &PropertyBag) -> Option<Call> {
        if let Some(existing) = self.get_call(path) {
            trace!(target: SERVICE_TARGET, path, "call already exists");
            return Some(existing);
        }
        if self.0.is_disconnected() {
            return None;
        }

        let state = CallState::from_remote(properties.get("State").and_then(Value::as_str));
        let direction = match state {
            CallState::Incoming | CallState::Waiting => Direction::Terminating,
            CallState::Dialing | CallState::Alerting | CallState::Active | CallState::Held => {
                Direction::Originating
            }
            CallState::Invalid | CallState::Disconnected => {
                debug!(target: SERVICE_TARGET, path, %state, "call already in invalid state");
                return None;
            }
        };

        let call = Call::new(path, &self.0);
        call.oface().update_properties(properties);
        call.prime(state, direction);
        self.register(&call);
        self.on_call_state(&call, state);

        let remote = call.remote().unwrap_or_default();
        if direction == Direction::Terminating {
            info!(target: SERVICE_TARGET, path, remote = %remote, %state, "incoming call");
            self.0.events().push(ModemEvent::Incoming { call: call.clone(), remote });
        } else if self.pending_dials() == 0 {
            info!(target: SERVICE_TARGET, path, remote = %remote, %state, "created call");
            self.0.events().push(ModemEvent::Created { call: call.clone(), remote });
        } else {
            debug!(target: SERVICE_TARGET, path, "deferring created call behind pending dial");
            self.0
                .with_mut(|manager| manager.created.push_back(call.clone()));
        }
        Some(call)
    }

    fn register(&self, call: &Call) {
        self.0.with_mut(|manager| {
            manager
                .instances
                .insert(String::from(call.path()), call.clone());
        });
        call.connect();
    }

    fn on_call_added(&self, signal: &Signal) {
        let path = signal.str_arg(0);
        let properties = signal.arg_at(1).and_then(Value::as_object);
        match (path, properties) {
            (Some(path), Some(properties)) => {
                if self.ensure_instance(path, properties).is_none() {
                    trace!(target: SERVICE_TARGET, path, "announced call not registered");
                }
            }
            _ => warn!(target: SERVICE_TARGET, "ignoring malformed CallAdded"),
        }
    }

    fn adopt_calls(&self, calls: &Value) {
        let Some(entries) = calls.as_array() else {
            warn!(target: SERVICE_TARGET, %calls, "ignoring malformed GetCalls reply");
            return;
        };
        for entry in entries {
            let path = entry.get(0).and_then(Value::as_str);
            let properties = entry.get(1).and_then(Value::as_object);
            match (path, properties) {
                (Some(path), Some(properties)) => {
                    if self.ensure_instance(path, properties).is_none() {
                        trace!(target: SERVICE_TARGET, path, "listed call not registered");
                    }
                }
                _ => warn!(target: SERVICE_TARGET, %entry, "ignoring malformed call entry"),
            }
        }
    }

    /// Drops the call at `path` and announces its removal.
    pub(crate) fn remove_instance(&self, path: &str) {
        let removed = self.0.with_mut(|manager| {
            let call = manager.instances.remove(path)?;
            manager.created.retain(|parked| parked != &call);
            manager.vacate(&call);
            Some(call)
        });
        let Some(call) = removed else {
            trace!(target: SERVICE_TARGET, path, "removed call was not registered");
            return;
        };
        debug!(target: SERVICE_TARGET, path, "call removed");
        call.disconnect();
        self.0.events().push(ModemEvent::Removed { call });
    }

    /// Updates the active and held slots after `call` entered `state`.
    pub(crate) fn on_call_state(&self, call: &Call, state: CallState) {
        if self.0.is_disconnected() {
            return;
        }
        let member = call.is_member();
        self.0.with_mut(|manager| match state {
            CallState::Active => {
                if manager.held.as_ref() == Some(call) {
                    manager.held = None;
                }
                if !member {
                    manager.active = Some(call.clone());
                }
            }
            CallState::Held => {
                if manager.active.as_ref() == Some(call) {
                    manager.active = None;
                }
                if !member {
                    manager.held = Some(call.clone());
                }
            }
            CallState::Disconnected | CallState::Invalid => manager.vacate(call),
            CallState::Dialing | CallState::Alerting | CallState::Incoming | CallState::Waiting => {
            }
        });
    }

    /// Clears any slot `call` holds after it joined a conference.
    pub(crate) fn evict_member(&self, call: &Call) {
        self.0.with_mut(|manager| manager.vacate(call));
    }

    /// Replays notifications for every live call.
    ///
    /// Queues the emergency numbers, then an incoming or created notification
    /// and a state notification per call. Does nothing unless connected.
    pub fn resume(&self) {
        if !self.is_connected() {
            return;
        }
        self.0
            .events()
            .push(ModemEvent::EmergencyNumbers(self.emergency_numbers()));
        for call in self.get_calls() {
            let state = call.state();
            if !state.is_live() {
                continue;
            }
            let remote = call.remote().unwrap_or_default();
            let event = if call.is_terminating() {
                ModemEvent::Incoming {
                    call: call.clone(),
                    remote,
                }
            } else {
                ModemEvent::Created {
                    call: call.clone(),
                    remote,
                }
            };
            self.0.events().push(event);
            self.0.events().push(ModemEvent::CallState {
                call,
                state,
                cause_type: CauseType::Unknown,
                cause: 0,
            });
        }
    }

    // --------------------------------------------------------------------
    // Dialing
    // --------------------------------------------------------------------

    /// Dials `destination`.
    ///
    /// `reply` receives the new call, or the error that prevented it. If the
    /// returned request is cancelled before the reply arrives, `reply` never
    /// runs and a call the dial nevertheless created is released.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError`] when the registry is not connected, the address
    /// is invalid, or the transport refuses the request.
    pub fn request_dial<F>(
        &self,
        destination: &str,
        clir: ClirOverride,
        reply: F,
    ) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<Call, ModemError>) + 'static,
    {
        self.0.require_connected()?;
        validate_address(destination).map_err(|source| LocalError::InvalidAddress {
            address: String::from(destination),
            source,
        })?;

        let timeout = self.0.with(|manager| manager.options.dial_timeout);
        let call = MethodCall::new(self.path(), CallManager::NAME, "Dial")
            .arg(destination)
            .arg(clir.as_remote())
            .with_timeout(timeout);
        let request = self.0.request_call(call, move |oface, request, outcome| {
            Self::from_oface(oface.clone()).on_dial_reply(request, outcome, reply);
        })?;

        request.add_cancel_override(mark_dial_canceled);
        request.add_attachment(DESTINATION_KEY, String::from(destination));
        let registry = self.0.downgrade();
        let id = request.id();
        request.add_notify(move || {
            if let Some(oface) = registry.upgrade() {
                Self::from_oface(oface).forget_dial(id);
            }
        });
        self.0
            .with_mut(|manager| manager.dialing.push_back(request.clone()));
        info!(target: SERVICE_TARGET, destination, clir = clir.as_remote(), "dialing");
        Ok(request)
    }

    fn on_dial_reply<F>(&self, request: &Request, outcome: Result<Value, ModemError>, reply: F)
    where
        F: FnOnce(&Self, Result<Call, ModemError>),
    {
        let destination: String = request.attachment(DESTINATION_KEY).unwrap_or_default();
        let result = outcome
            .and_then(|value| {
                value.as_str().map(String::from).ok_or_else(|| {
                    ModemError::transport(
                        TransportFault::InvalidArgs,
                        format!("Dial reply carries no call path: {value}"),
                    )
                })
            })
            .map(|path| self.get_dialed(&path, &destination));

        match &result {
            Ok(call) => info!(
                target: SERVICE_TARGET,
                destination = %destination,
                path = %call.path(),
                "dial successful"
            ),
            Err(error) => warn!(
                target: SERVICE_TARGET,
                destination = %destination,
                name = %error.fqn(),
                %error,
                "dial failed"
            ),
        }

        if request.has_attachment(CANCELED_KEY) {
            if let Ok(call) = &result {
                debug!(target: SERVICE_TARGET, path = %call.path(), "releasing call of canceled dial");
                if let Err(error) = call.release(|_, _| {}) {
                    warn!(target: SERVICE_TARGET, %error, "failed to release call of canceled dial");
                }
            }
        } else {
            reply(self, result);
        }

        self.forget_dial(request.id());
    }

    fn forget_dial(&self, id: RequestId) {
        self.0
            .with_mut(|manager| manager.dialing.retain(|queued| queued.id() != id));
        self.drain_created();
    }

    fn get_dialed(&self, path: &str, destination: &str) -> Call {
        if let Some(existing) = self.get_call(path) {
            self.0
                .with_mut(|manager| manager.created.retain(|parked| parked != &existing));
            return existing;
        }
        let call = Call::new(path, &self.0);
        call.oface()
            .apply_property_update("State", &Value::from("dialing"));
        call.oface()
            .apply_property_update("LineIdentification", &Value::from(destination));
        call.prime(CallState::Dialing, Direction::Originating);
        call.set_emergency(self.emergency_service(destination));
        self.register(&call);
        call
    }

    fn drain_created(&self) {
        loop {
            let next = self.0.with_mut(|manager| {
                if manager.dialing.is_empty() {
                    manager.created.pop_front()
                } else {
                    None
                }
            });
            let Some(call) = next else {
                break;
            };
            let remote = call.remote().unwrap_or_default();
            debug!(target: SERVICE_TARGET, path = %call.path(), "announcing deferred call");
            self.0.events().push(ModemEvent::Created { call, remote });
        }
    }

    // --------------------------------------------------------------------
    // Manager operations
    // --------------------------------------------------------------------

    /// Swaps the active and held calls with `SwapCalls`.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError`] when not connected or the transport refuses the
    /// request.
    pub fn swap_calls<F>(&self, reply: F) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<(), ModemError>) + 'static,
    {
        self.manager_request("SwapCalls", reply)
    }

    /// Joins the active and held calls into a conference with
    /// `CreateMultiparty`.
    ///
    /// On success every call the reply names is marked as a member.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError`] when not connected or the transport refuses the
    /// request.
    pub fn request_conference<F>(&self, reply: F) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<(), ModemError>) + 'static,
    {
        self.0.require_connected()?;
        debug!(target: SERVICE_TARGET, path = %self.path(), "creating conference");
        self.0.request("CreateMultiparty", Vec::new(), move |oface, _, outcome| {
            let service = Self::from_oface(oface.clone());
            let result = outcome.and_then(|value| path_list(&value)).map(|paths| {
                for path in paths {
                    if let Some(call) = service.get_call(&path) {
                        call.set_multiparty(true);
                    }
                }
            });
            reply(&service, result);
        })
    }

    /// Hangs up every conference member with `HangupMultiparty`.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError`] when not connected or the transport refuses the
    /// request.
    pub fn hangup_conference<F>(&self, reply: F) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<(), ModemError>) + 'static,
    {
        self.manager_request("HangupMultiparty", reply)
    }

    /// Hangs up every call with `HangupAll`.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError`] when not connected or the transport refuses the
    /// request.
    pub fn hangup_all<F>(&self, reply: F) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<(), ModemError>) + 'static,
    {
        self.manager_request("HangupAll", reply)
    }

    fn manager_request<F>(&self, method: &'static str, reply: F) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<(), ModemError>) + 'static,
    {
        self.0.require_connected()?;
        debug!(target: SERVICE_TARGET, path = %self.path(), method, "call manager request");
        self.0.request(method, Vec::new(), move |oface, _, outcome| {
            reply(&Self::from_oface(oface.clone()), outcome.map(|_| ()));
        })
    }
}

#[cfg(test)]
mod tests;
