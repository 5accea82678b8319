//! A call registry wired to a [`ScriptedTransport`], with helpers that play
//! the modem's side of the conversation.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};

use crate::call::Call;
use crate::errors::{LocalError, ModemError};
use crate::events::{EventQueue, ModemEvent};
use crate::request::Request;
use crate::service::{CallService, CallServiceOptions};
use crate::transport::Signal;

use super::transport::ScriptedTransport;

/// Object path of the modem every harness drives.
pub const MODEM_PATH: &str = "/ril_0";

const MANAGER: &str = "org.ofono.VoiceCallManager";
const VOICE_CALL: &str = "org.ofono.VoiceCall";

/// Slot a dial reply lands in.
pub type DialOutcome = Rc<RefCell<Option<Result<Call, ModemError>>>>;

/// Registry, transport and event queue for one scenario.
pub struct ModemHarness {
    pub transport: Rc<ScriptedTransport>,
    pub events: EventQueue,
    pub service: CallService,
}

impl ModemHarness {
    /// Builds an unconnected registry with default options.
    pub fn new() -> Self {
        Self::with_options(CallServiceOptions::default())
    }

    /// Builds an unconnected registry.
    pub fn with_options(options: CallServiceOptions) -> Self {
        let transport = ScriptedTransport::new();
        let events = EventQueue::new();
        let service = CallService::new(MODEM_PATH, transport.as_dyn(), events.clone(), options);
        Self {
            transport,
            events,
            service,
        }
    }

    /// Builds a registry that finished connecting with no calls, with the
    /// event queue drained.
    pub fn connected() -> Self {
        let harness = Self::new();
        assert!(harness.service.connect());
        harness.finish_connect(&json!([]));
        drop(harness.events.drain());
        harness
    }

    /// Answers the registry's connect requests, reporting `calls` from
    /// `GetCalls`.
    pub fn finish_connect(&self, calls: &Value) {
        self.transport.succeed("GetProperties", json!({}));
        self.transport.succeed("GetCalls", calls.clone());
    }

    /// Object path of the call named `name`.
    pub fn call_path(name: &str) -> String {
        format!("{MODEM_PATH}/{name}")
    }

    /// Announces a call with `CallAdded`.
    pub fn add_call(&self, name: &str, state: &str, remote: &str) {
        self.transport.emit(
            &Signal::new(MODEM_PATH, MANAGER, "CallAdded")
                .arg(Self::call_path(name))
                .arg(json!({ "State": state, "LineIdentification": remote })),
        );
    }

    /// Withdraws a call with `CallRemoved`.
    pub fn remove_call(&self, name: &str) {
        self.transport.emit(
            &Signal::new(MODEM_PATH, MANAGER, "CallRemoved").arg(Self::call_path(name)),
        );
    }

    /// Changes a property of the call named `name`.
    pub fn set_call_property(&self, name: &str, property: &str, value: Value) {
        self.transport.emit(
            &Signal::new(Self::call_path(name), VOICE_CALL, "PropertyChanged")
                .arg(property)
                .arg(value),
        );
    }

    /// Moves the call named `name` to `state`.
    pub fn set_call_state(&self, name: &str, state: &str) {
        self.set_call_property(name, "State", Value::from(state));
    }

    /// Reports why the call named `name` ended.
    pub fn disconnect_reason(&self, name: &str, reason: &str) {
        self.transport.emit(
            &Signal::new(Self::call_path(name), VOICE_CALL, "DisconnectReason").arg(reason),
        );
    }

    /// Changes a property of the call manager.
    pub fn set_manager_property(&self, property: &str, value: Value) {
        self.transport.emit(
            &Signal::new(MODEM_PATH, MANAGER, "PropertyChanged")
                .arg(property)
                .arg(value),
        );
    }

    /// Dials `destination`, collecting the reply.
    pub fn dial(&self, destination: &str) -> Result<(Request, DialOutcome), LocalError> {
        let outcome: DialOutcome = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&outcome);
        let request = self.service.request_dial(
            destination,
            crate::call::ClirOverride::Default,
            move |_, result| *slot.borrow_mut() = Some(result),
        )?;
        Ok((request, outcome))
    }

    /// Answers the oldest outstanding `Dial` with the call named `name`.
    pub fn answer_dial(&self, name: &str) {
        self.transport
            .succeed("Dial", Value::from(Self::call_path(name)));
    }

    /// The registered call named `name`.
    ///
    /// # Panics
    ///
    /// Panics when no such call is registered.
    pub fn call(&self, name: &str) -> Call {
        match self.service.get_call(&Self::call_path(name)) {
            Some(call) => call,
            None => panic!("no call named {name}"),
        }
    }

    /// Drains the queue into readable labels.
    ///
    /// Connection events of individual call legs are dropped; every call
    /// connects synchronously as it is registered.
    pub fn event_labels(&self) -> Vec<String> {
        self.events
            .drain()
            .iter()
            .filter(|event| {
                !matches!(
                    event,
                    ModemEvent::Connected {
                        interface: VOICE_CALL,
                        ..
                    }
                )
            })
            .map(event_label)
            .collect()
    }
}

/// Short label for an event, e.g. `created voicecall01`.
fn event_label(event: &ModemEvent) -> String {
    match event {
        ModemEvent::Connected {
            interface,
            connected,
            ..
        } => format!("connected {interface} {connected}"),
        ModemEvent::Incoming { call, .. } => format!("incoming {}", call.name()),
        ModemEvent::Created { call, .. } => format!("created {}", call.name()),
        ModemEvent::Removed { call } => format!("removed {}", call.name()),
        ModemEvent::CallState { call, state, .. } => {
            format!("state {} {}", call.name(), state.display_name())
        }
        ModemEvent::CallOnHold { call, on_hold } => format!("on-hold {} {on_hold}", call.name()),
        ModemEvent::EmergencyNumbers(numbers) => format!("emergency {}", numbers.join(",")),
    }
}
