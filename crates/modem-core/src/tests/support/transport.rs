//! Scripted in-memory transport used in tests.
//!
//! Calls are parked until the test answers them with [`ScriptedTransport::reply`]
//! (or one of its conveniences). Cancelling runs the completion notify
//! synchronously, which is the most re-entrant behaviour a real transport may
//! exhibit. Signals are delivered with [`ScriptedTransport::emit`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use crate::errors::ModemError;
use crate::transport::{
    CallToken, CompletionNotify, MethodCall, Reply, ReplyHandler, Signal, SignalHandler,
    SignalRule, SubscriptionId, Transport,
};

struct ParkedCall {
    call: MethodCall,
    reply: ReplyHandler,
    notify: CompletionNotify,
}

#[derive(Default)]
struct ScriptState {
    next_token: u64,
    next_subscription: u64,
    parked: BTreeMap<CallToken, ParkedCall>,
    issued: Vec<MethodCall>,
    cancelled: Vec<CallToken>,
    subscriptions: BTreeMap<SubscriptionId, (SignalRule, SignalHandler)>,
    refuse_next: Option<ModemError>,
}

/// Test double that parks every call until the test answers it.
#[derive(Default)]
pub struct ScriptedTransport {
    state: RefCell<ScriptState>,
}

impl ScriptedTransport {
    /// Creates an empty transport.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Upcasts a shared handle for the engine's constructors.
    pub fn as_dyn(self: &Rc<Self>) -> Rc<dyn Transport> {
        let transport: Rc<dyn Transport> = Rc::clone(self) as Rc<dyn Transport>;
        transport
    }

    /// Makes the next `begin_call` fail with `error`.
    pub fn refuse_next(&self, error: ModemError) {
        self.state.borrow_mut().refuse_next = Some(error);
    }

    /// Every call ever started, in order.
    pub fn issued(&self) -> Vec<MethodCall> {
        self.state.borrow().issued.clone()
    }

    /// Method names of every call ever started, in order.
    pub fn issued_methods(&self) -> Vec<&'static str> {
        self.state.borrow().issued.iter().map(|call| call.method).collect()
    }

    /// Method names of calls still awaiting a reply, in issue order.
    pub fn parked_methods(&self) -> Vec<&'static str> {
        self.state
            .borrow()
            .parked
            .values()
            .map(|parked| parked.call.method)
            .collect()
    }

    /// Tokens passed to `cancel_call`, in order.
    pub fn cancelled(&self) -> Vec<CallToken> {
        self.state.borrow().cancelled.clone()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }

    /// Token of the oldest parked call for `method`.
    pub fn token_for(&self, method: &str) -> Option<CallToken> {
        self.state
            .borrow()
            .parked
            .iter()
            .find(|(_, parked)| parked.call.method == method)
            .map(|(token, _)| *token)
    }

    /// Parked call for `token`, if still outstanding.
    pub fn parked_call(&self, token: CallToken) -> Option<MethodCall> {
        self.state
            .borrow()
            .parked
            .get(&token)
            .map(|parked| parked.call.clone())
    }

    /// Completes the call named by `token`.
    ///
    /// # Panics
    ///
    /// Panics when the token is not parked.
    pub fn reply(&self, token: CallToken, reply: Reply) {
        let parked = self.state.borrow_mut().parked.remove(&token);
        let Some(parked) = parked else {
            panic!("no parked call for {token}");
        };
        (parked.reply)(reply);
        (parked.notify)();
    }

    /// Completes the oldest parked call for `method`.
    ///
    /// # Panics
    ///
    /// Panics when no such call is parked.
    pub fn reply_to(&self, method: &str, reply: Reply) -> CallToken {
        let Some(token) = self.token_for(method) else {
            panic!("no parked call for {method}; parked: {:?}", self.parked_methods());
        };
        self.reply(token, reply);
        token
    }

    /// Completes the oldest parked call for `method` successfully.
    pub fn succeed(&self, method: &str, value: Value) -> CallToken {
        self.reply_to(method, Ok(value))
    }

    /// Delivers `signal` to every matching subscription.
    pub fn emit(&self, signal: &Signal) {
        let handlers: Vec<SignalHandler> = self
            .state
            .borrow()
            .subscriptions
            .values()
            .filter(|(rule, _)| rule.matches(signal))
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in handlers {
            handler(signal);
        }
    }
}

impl Transport for ScriptedTransport {
    fn begin_call(
        &self,
        call: MethodCall,
        reply: ReplyHandler,
        notify: CompletionNotify,
    ) -> Result<CallToken, ModemError> {
        let mut state = self.state.borrow_mut();
        if let Some(error) = state.refuse_next.take() {
            return Err(error);
        }
        state.next_token += 1;
        let token = CallToken::new(state.next_token);
        state.issued.push(call.clone());
        state.parked.insert(
            token,
            ParkedCall {
                call,
                reply,
                notify,
            },
        );
        Ok(token)
    }

    fn cancel_call(&self, token: CallToken) {
        let parked = {
            let mut state = self.state.borrow_mut();
            state.cancelled.push(token);
            state.parked.remove(&token)
        };
        if let Some(parked) = parked {
            drop(parked.reply);
            (parked.notify)();
        }
    }

    fn subscribe(&self, rule: SignalRule, handler: SignalHandler) -> SubscriptionId {
        let mut state = self.state.borrow_mut();
        state.next_subscription += 1;
        let id = SubscriptionId::new(state.next_subscription);
        state.subscriptions.insert(id, (rule, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let removed = self.state.borrow_mut().subscriptions.remove(&id);
        drop(removed);
    }
}
