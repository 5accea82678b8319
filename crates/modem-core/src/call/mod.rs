//! One remote call leg and the operations it supports.
//!
//! A [`Call`] is a proxy of `org.ofono.VoiceCall`. It tracks the remote state
//! through `PropertyChanged` and `DisconnectReason` signals, reports every
//! state transition to the owning [`CallService`], and queues a
//! [`ModemEvent::CallState`] notification for the application. Calls are
//! created by the registry; applications only ever receive handles to them.

mod address;
mod state;
mod tones;

use std::any::Any;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, trace};

pub use self::address::{
    SOS_URN, SplitAddress, emergency_service, is_valid_address, split_address,
    valid_emergency_urn, validate_address,
};
pub use self::state::{CallState, ClirOverride};
pub use self::tones::{Tone, error_tone, event_tone};
use crate::errors::{
    CallError, CallNetError, CauseType, CodeSpace, DialStringProblem, LocalError, ModemError,
    TransportFault, call_cause_error,
};
use crate::events::ModemEvent;
use crate::oface::{Interface, Oface, WeakOface};
use crate::request::Request;
use crate::service::{CallManager, CallService};

/// Log target for call leg events.
pub(crate) const CALL_TARGET: &str = "modem_core::call";

/// DTMF strings this long or longer are rejected.
const DTMF_LIMIT: usize = 255;

/// Which side set the call up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Originating,
    Terminating,
}

#[derive(Debug)]
pub(crate) struct CallLeg {
    manager: WeakOface<CallManager>,
    manager_path: String,
    state_str: Option<String>,
    state: CallState,
    remote: Option<String>,
    emergency: Option<String>,
    start_time: Option<String>,
    cause_type: CauseType,
    cause: u32,
    originating: bool,
    terminating: bool,
    on_hold: bool,
    multiparty: bool,
    handler: Option<Weak<dyn Any>>,
}

impl Interface for CallLeg {
    const NAME: &'static str = "org.ofono.VoiceCall";

    fn map_property(name: &str) -> Option<&'static str> {
        match name {
            "LineIdentification" => Some("remote"),
            "Multiparty" => Some("multiparty"),
            "State" => Some("ofono-state"),
            "StartTime" => Some("start-time"),
            "RemoteHeld" => Some("remote-held"),
            _ => None,
        }
    }

    fn apply_property(oface: &Oface<Self>, attribute: &'static str, value: &Value) {
        let call = Call(oface.clone());
        match attribute {
            "remote" => {
                let remote = value.as_str().map(String::from);
                oface.with_mut(|leg| leg.remote = remote);
            }
            "start-time" => {
                let start_time = value.as_str().map(String::from);
                oface.with_mut(|leg| leg.start_time = start_time);
            }
            "multiparty" => call.set_multiparty(value.as_bool().unwrap_or_default()),
            "ofono-state" => {
                let state = value.as_str().map(String::from);
                oface.with_mut(|leg| leg.state_str = state);
                if oface.is_connected() {
                    call.evaluate_state();
                }
            }
            "remote-held" => {
                let on_hold = value.as_bool().unwrap_or_default();
                oface.with_mut(|leg| leg.on_hold = on_hold);
                oface.events().push(ModemEvent::CallOnHold { call, on_hold });
            }
            _ => {}
        }
    }

    fn start_connect(oface: &Oface<Self>) {
        // Initial properties arrive with the call, so only subscribe.
        oface.connect_properties(false);
        oface.subscribe("DisconnectReason", |oface, signal| {
            Call(oface.clone()).on_disconnect_reason(signal.str_arg(0).unwrap_or_default());
        });
    }

    fn on_connected(oface: &Oface<Self>) {
        Call(oface.clone()).evaluate_state();
    }
}

/// Shared handle to one call leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call(Oface<CallLeg>);

impl Call {
    pub(crate) fn new(path: &str, manager: &Oface<CallManager>) -> Self {
        let leg = CallLeg {
            manager: manager.downgrade(),
            manager_path: String::from(manager.path()),
            state_str: None,
            state: CallState::Invalid,
            remote: None,
            emergency: None,
            start_time: None,
            cause_type: CauseType::Unknown,
            cause: 0,
            originating: false,
            terminating: false,
            on_hold: false,
            multiparty: false,
            handler: None,
        };
        Self(Oface::new(
            path,
            Rc::clone(manager.transport()),
            manager.events().clone(),
            leg,
        ))
    }

    pub(crate) const fn oface(&self) -> &Oface<CallLeg> {
        &self.0
    }

    /// Object path of the call.
    #[must_use]
    pub fn path(&self) -> &str {
        self.0.path()
    }

    /// Last path segment, e.g. `voicecall01`.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path()
            .rsplit_once('/')
            .map_or("<invalid>", |(_, name)| name)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CallState {
        self.0.with(|leg| leg.state)
    }

    /// Upper-case name of the current state.
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        self.state().display_name()
    }

    /// Remote party address, if known.
    #[must_use]
    pub fn remote(&self) -> Option<String> {
        self.0.with(|leg| leg.remote.clone())
    }

    /// Emergency service the call was dialled to, if any.
    #[must_use]
    pub fn emergency(&self) -> Option<String> {
        self.0.with(|leg| leg.emergency.clone())
    }

    /// Remote `StartTime`, if reported.
    #[must_use]
    pub fn start_time(&self) -> Option<String> {
        self.0.with(|leg| leg.start_time.clone())
    }

    /// Origin of the last clearing cause.
    #[must_use]
    pub fn cause_type(&self) -> CauseType {
        self.0.with(|leg| leg.cause_type)
    }

    /// Last clearing cause code.
    #[must_use]
    pub fn cause(&self) -> u32 {
        self.0.with(|leg| leg.cause)
    }

    /// Structured error describing the last clearing cause.
    #[must_use]
    pub fn cause_error(&self, context: Option<&str>) -> ModemError {
        let (cause_type, cause) = self.0.with(|leg| (leg.cause_type, leg.cause));
        call_cause_error(cause_type, cause, context)
    }

    /// Tone matching the current state and cause.
    #[must_use]
    pub fn tone(&self) -> Tone {
        let (state, cause_type, cause) = self.0.with(|leg| (leg.state, leg.cause_type, leg.cause));
        event_tone(state, cause_type, cause)
    }

    /// Returns `true` for a call set up locally.
    #[must_use]
    pub fn is_originating(&self) -> bool {
        self.0.with(|leg| leg.originating)
    }

    /// Returns `true` for a call set up by the remote party.
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        self.0.with(|leg| leg.terminating)
    }

    /// Returns `true` while part of a multiparty call.
    #[must_use]
    pub fn is_member(&self) -> bool {
        self.0.with(|leg| leg.multiparty)
    }

    /// Returns `true` while the remote party holds the call.
    #[must_use]
    pub fn is_on_hold(&self) -> bool {
        self.0.with(|leg| leg.on_hold)
    }

    /// Returns `true` in [`CallState::Active`].
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == CallState::Active
    }

    /// Returns `true` in [`CallState::Held`].
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.state() == CallState::Held
    }

    /// Returns `true` when the call can join a conference.
    #[must_use]
    pub fn can_join(&self) -> bool {
        matches!(self.state(), CallState::Active | CallState::Held)
    }

    /// Returns `true` once the proxy is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.0.is_connected()
    }

    // --------------------------------------------------------------------
    // Handler claim
    // --------------------------------------------------------------------

    /// Claims the call for `handler`.
    ///
    /// Fails when a different handler that is still alive holds the claim.
    #[must_use]
    pub fn try_set_handler(&self, handler: &Rc<dyn Any>) -> bool {
        self.0.with_mut(|leg| {
            let claimed = leg
                .handler
                .as_ref()
                .and_then(Weak::upgrade)
                .is_some_and(|current| !Rc::ptr_eq(&current, handler));
            if claimed {
                return false;
            }
            leg.handler = Some(Rc::downgrade(handler));
            true
        })
    }

    /// Claims the call for `handler`, replacing any previous claim.
    pub fn set_handler(&self, handler: &Rc<dyn Any>) {
        let replaced = self
            .0
            .with_mut(|leg| leg.handler.replace(Rc::downgrade(handler)));
        if replaced.is_some_and(|previous| previous.upgrade().is_some()) {
            debug!(target: CALL_TARGET, path = %self.path(), "call handler replaced");
        }
    }

    /// Current handler, if it is still alive.
    #[must_use]
    pub fn handler(&self) -> Option<Rc<dyn Any>> {
        self.0
            .with(|leg| leg.handler.as_ref().and_then(Weak::upgrade))
    }

    /// Drops the claim.
    pub fn clear_handler(&self) {
        self.0.with_mut(|leg| leg.handler = None);
    }

    // --------------------------------------------------------------------
    // Operations
    // --------------------------------------------------------------------

    /// Answers the call; a waiting call is answered with `HoldAndAnswer`.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError`] when the call is not connected or the transport
    /// refuses the request.
    pub fn answer<F>(&self, reply: F) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<(), ModemError>) + 'static,
    {
        self.0.require_connected()?;
        if self.state() == CallState::Waiting {
            self.on_manager("HoldAndAnswer", Vec::new(), reply)
        } else {
            self.on_leg("Answer", Vec::new(), reply)
        }
    }

    /// Hangs the call up.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError`] when the call is not connected or the transport
    /// refuses the request.
    pub fn release<F>(&self, reply: F) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<(), ModemError>) + 'static,
    {
        self.0.require_connected()?;
        self.on_leg("Hangup", Vec::new(), reply)
    }

    /// Puts an active call on hold or retrieves a held one with `SwapCalls`.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError::InvalidTransition`] unless holding an active call
    /// or retrieving a held one, and [`LocalError`] when the call is not
    /// connected or the transport refuses the request.
    pub fn hold<F>(&self, hold: bool, reply: F) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<(), ModemError>) + 'static,
    {
        self.0.require_connected()?;
        let state = self.state();
        let legal = match state {
            CallState::Active => hold,
            CallState::Held => !hold,
            _ => false,
        };
        if !legal {
            let operation = if hold { "hold" } else { "unhold" };
            debug!(target: CALL_TARGET, path = %self.path(), operation, %state, "invalid hold request");
            return Err(LocalError::transition(operation, state));
        }
        self.on_manager("SwapCalls", Vec::new(), reply)
    }

    /// Splits the call out of a conference with `PrivateChat`.
    ///
    /// The reply carries the paths of the calls left in the conference.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError`] when the call is not connected or the transport
    /// refuses the request.
    pub fn split<F>(&self, reply: F) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<Vec<String>, ModemError>) + 'static,
    {
        self.0.require_connected()?;
        let manager = self.manager()?;
        let call = self.clone();
        manager.request(
            "PrivateChat",
            vec![Value::from(self.path())],
            move |_, _, outcome| {
                let paths = outcome.and_then(|value| path_list(&value));
                if let Ok(paths) = &paths {
                    trace!(target: CALL_TARGET, path = %call.path(), remaining = paths.len(), "split from conference");
                }
                reply(&call, paths);
            },
        )
    }

    /// Sends a DTMF string with `SendTones`.
    ///
    /// Accepts `0-9 * # p w a-d` in either case; letters are sent lower-case.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError::InvalidDialString`] for an empty, too long or
    /// malformed string, and [`LocalError`] when the call is not connected or
    /// the transport refuses the request.
    pub fn send_dtmf<F>(&self, tones: &str, reply: F) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<(), ModemError>) + 'static,
    {
        self.0.require_connected()?;
        let tones = normalize_dtmf(tones)?;
        self.on_manager("SendTones", vec![Value::from(tones)], reply)
    }

    /// Sends one DTMF tone.
    ///
    /// # Errors
    ///
    /// As for [`Call::send_dtmf`].
    pub fn start_dtmf<F>(&self, tone: char, reply: F) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<(), ModemError>) + 'static,
    {
        self.send_dtmf(tone.encode_utf8(&mut [0; 4]), reply)
    }

    /// Stops the tones in progress with `StopTones`.
    ///
    /// # Errors
    ///
    /// Returns [`LocalError`] when the call is not connected or the transport
    /// refuses the request.
    pub fn stop_dtmf<F>(&self, reply: F) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<(), ModemError>) + 'static,
    {
        self.0.require_connected()?;
        self.on_manager("StopTones", Vec::new(), reply)
    }

    fn on_leg<F>(&self, method: &'static str, args: Vec<Value>, reply: F) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<(), ModemError>) + 'static,
    {
        debug!(target: CALL_TARGET, path = %self.path(), method, "call request");
        self.0.request(method, args, move |oface, _, outcome| {
            reply(&Self(oface.clone()), outcome.map(|_| ()));
        })
    }

    fn on_manager<F>(
        &self,
        method: &'static str,
        args: Vec<Value>,
        reply: F,
    ) -> Result<Request, LocalError>
    where
        F: FnOnce(&Self, Result<(), ModemError>) + 'static,
    {
        let manager = self.manager()?;
        debug!(target: CALL_TARGET, path = %self.path(), method, "call manager request");
        let call = self.clone();
        manager.request(method, args, move |_, _, outcome| {
            reply(&call, outcome.map(|_| ()));
        })
    }

    fn manager(&self) -> Result<Oface<CallManager>, LocalError> {
        let (manager, path) = self
            .0
            .with(|leg| (leg.manager.upgrade(), leg.manager_path.clone()));
        manager.ok_or_else(|| LocalError::not_connected(&path, CallManager::NAME))
    }

    fn service(&self) -> Option<CallService> {
        self.0
            .with(|leg| leg.manager.upgrade())
            .map(CallService::from_oface)
    }

    // --------------------------------------------------------------------
    // Registry hooks
    // --------------------------------------------------------------------

    pub(crate) fn connect(&self) -> bool {
        self.0.connect()
    }

    pub(crate) fn disconnect(&self) {
        self.0.disconnect();
    }

    /// Sets the state and direction a call is first observed in.
    pub(crate) fn prime(&self, state: CallState, direction: Direction) {
        self.0.with_mut(|leg| {
            leg.state = state;
            leg.originating = direction == Direction::Originating;
            leg.terminating = direction == Direction::Terminating;
        });
    }

    pub(crate) fn set_emergency(&self, emergency: Option<String>) {
        self.0.with_mut(|leg| leg.emergency = emergency);
    }

    pub(crate) fn set_multiparty(&self, multiparty: bool) {
        let joined = self.0.with_mut(|leg| {
            let joined = multiparty && !leg.multiparty;
            leg.multiparty = multiparty;
            joined
        });
        if joined {
            if let Some(service) = self.service() {
                service.evict_member(self);
            }
        }
    }

    fn on_disconnect_reason(&self, reason: &str) {
        let cause_type = CauseType::from_disconnect_reason(reason);
        // The remote API reports no exact network cause.
        let cause = if cause_type == CauseType::Network {
            CallNetError::NetworkOutOfOrder.code()
        } else {
            CallError::ReleaseByUser.code()
        };
        debug!(target: CALL_TARGET, path = %self.path(), %cause_type, cause, "disconnect reason");
        self.0.with_mut(|leg| {
            leg.cause_type = cause_type;
            leg.cause = cause;
        });
    }

    fn evaluate_state(&self) {
        let transition = self.0.with_mut(|leg| {
            let next = CallState::from_remote(leg.state_str.as_deref());
            (next != leg.state).then(|| {
                leg.state = next;
                (next, leg.cause_type, leg.cause)
            })
        });
        let Some((state, cause_type, cause)) = transition else {
            return;
        };
        debug!(target: CALL_TARGET, path = %self.path(), %state, "call state changed");
        if let Some(service) = self.service() {
            service.on_call_state(self, state);
        }
        self.0.events().push(ModemEvent::CallState {
            call: self.clone(),
            state,
            cause_type,
            cause,
        });
    }
}

/// Validates a DTMF string and folds it to the characters sent to the modem.
pub(crate) fn normalize_dtmf(tones: &str) -> Result<String, LocalError> {
    let problem = |problem| LocalError::InvalidDialString { problem };
    if tones.is_empty() {
        return Err(problem(DialStringProblem::Empty));
    }
    let mut folded = String::with_capacity(tones.len());
    for (position, character) in tones.chars().enumerate() {
        if position + 1 >= DTMF_LIMIT {
            return Err(problem(DialStringProblem::TooLong {
                length: tones.chars().count(),
            }));
        }
        match character {
            '0'..='9' | '*' | '#' => folded.push(character),
            'p' | 'P' | 'w' | 'W' | 'a'..='d' | 'A'..='D' => {
                folded.push(character.to_ascii_lowercase());
            }
            _ => {
                return Err(problem(DialStringProblem::InvalidCharacter {
                    character,
                    position,
                }));
            }
        }
    }
    Ok(folded)
}

/// Reads an array of object paths from a reply.
pub(crate) fn path_list(value: &Value) -> Result<Vec<String>, ModemError> {
    let malformed = || {
        ModemError::transport(
            TransportFault::InvalidArgs,
            format!("expected a list of object paths, got {value}"),
        )
    };
    value
        .as_array()
        .ok_or_else(malformed)?
        .iter()
        .map(|path| path.as_str().map(String::from).ok_or_else(malformed))
        .collect()
}
