//! One in-flight remote call and the state attached to it.
//!
//! A [`Request`] is a cheap, clonable handle. Every remote operation the engine
//! performs returns one so callers can cancel it or hang context off it while
//! the reply is outstanding. Teardown happens exactly once: when the transport
//! releases the call, or synchronously when a request that never reached the
//! transport is cancelled. Teardown runs the attachment destructors in
//! insertion order and drops the owner and transport references.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::errors::ModemError;
use crate::transport::{CallToken, MethodCall, Reply, Transport};

const REQUEST_TARGET: &str = "modem_core::request";

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

type Destructor = Box<dyn FnOnce(Box<dyn Any>)>;
type CancelOverride = Box<dyn FnOnce(&Request)>;

struct Attachment {
    key: Option<&'static str>,
    value: Box<dyn Any>,
    destructor: Option<Destructor>,
}

impl Attachment {
    fn release(self) {
        match self.destructor {
            Some(destructor) => destructor(self.value),
            None => drop(self.value),
        }
    }
}

#[derive(Default)]
struct RequestState {
    owner: Option<Rc<dyn Any>>,
    transport: Option<Rc<dyn Transport>>,
    call: Option<CallToken>,
    attachments: Vec<Attachment>,
    cancel_override: Option<CancelOverride>,
    finished: bool,
}

/// Handle to one outstanding remote call.
#[derive(Clone)]
pub struct Request {
    id: RequestId,
    method: &'static str,
    state: Rc<RefCell<RequestState>>,
}

impl Request {
    pub(crate) fn new(
        method: &'static str,
        owner: Option<Rc<dyn Any>>,
        transport: Option<Rc<dyn Transport>>,
    ) -> Self {
        Self {
            id: RequestId::next(),
            method,
            state: Rc::new(RefCell::new(RequestState {
                owner,
                transport,
                ..RequestState::default()
            })),
        }
    }

    /// Starts `call` on `transport` and returns the handle tracking it.
    ///
    /// `owner` is kept alive until teardown and can be recovered from the
    /// handle with [`Request::owner`]. `on_reply` runs once with the outcome
    /// unless the call is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns the transport's error when it refuses the call; no request is
    /// created in that case.
    pub fn issue<F>(
        owner: Option<Rc<dyn Any>>,
        transport: &Rc<dyn Transport>,
        call: MethodCall,
        on_reply: F,
    ) -> Result<Self, ModemError>
    where
        F: FnOnce(&Self, Reply) + 'static,
    {
        let request = Self::new(call.method, owner, Some(Rc::clone(transport)));
        debug!(target: REQUEST_TARGET, id = %request.id, %call, "issuing request");

        let replying = request.clone();
        let finishing = request.clone();
        let started = transport.begin_call(
            call,
            Box::new(move |reply| {
                replying.mark_completed();
                on_reply(&replying, reply);
            }),
            Box::new(move || finishing.finish()),
        );

        match started {
            Ok(token) => {
                request.state.borrow_mut().call = Some(token);
                Ok(request)
            }
            Err(error) => {
                debug!(target: REQUEST_TARGET, id = %request.id, %error, "transport refused request");
                request.finish();
                Err(error)
            }
        }
    }

    /// Identifier used for queue membership.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Remote method this request invoked.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        self.method
    }

    /// Returns `true` while the transport still holds the call.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        let state = self.state.borrow();
        !state.finished && state.call.is_some()
    }

    /// Returns `true` once teardown has run.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.borrow().finished
    }

    /// Typed owner, if one was supplied at issue and teardown has not run.
    #[must_use]
    pub fn owner<T: Any>(&self) -> Option<Rc<T>> {
        let owner = self.state.borrow().owner.clone()?;
        owner.downcast::<T>().ok()
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// The replaced value is dropped immediately; otherwise `value` is dropped
    /// at teardown.
    pub fn add_attachment<T: Any>(&self, key: &'static str, value: T) {
        self.insert(Some(key), Box::new(value), None);
    }

    /// Stores `value` under `key` with a destructor run at teardown.
    ///
    /// A value replaced under the same key has its destructor run immediately.
    pub fn add_attachment_with<T, D>(&self, key: &'static str, value: T, destructor: D)
    where
        T: Any,
        D: FnOnce(T) + 'static,
    {
        let destructor: Destructor = Box::new(move |boxed: Box<dyn Any>| {
            if let Ok(typed) = boxed.downcast::<T>() {
                destructor(*typed);
            }
        });
        self.insert(Some(key), Box::new(value), Some(destructor));
    }

    /// Registers a keyless destructor run at teardown with the attachments.
    pub fn add_notify<D>(&self, notify: D)
    where
        D: FnOnce() + 'static,
    {
        let destructor: Destructor = Box::new(move |_| notify());
        self.insert(None, Box::new(()), Some(destructor));
    }

    /// Clone of the value stored under `key`, if it has type `T`.
    #[must_use]
    pub fn attachment<T: Any + Clone>(&self, key: &'static str) -> Option<T> {
        let state = self.state.borrow();
        state
            .attachments
            .iter()
            .find(|attachment| attachment.key == Some(key))
            .and_then(|attachment| attachment.value.downcast_ref::<T>())
            .cloned()
    }

    /// Returns `true` when a value is stored under `key`.
    #[must_use]
    pub fn has_attachment(&self, key: &'static str) -> bool {
        self.state
            .borrow()
            .attachments
            .iter()
            .any(|attachment| attachment.key == Some(key))
    }

    /// Removes and returns the value under `key` without running its
    /// destructor. Values of another type are left in place.
    #[must_use]
    pub fn take_attachment<T: Any>(&self, key: &'static str) -> Option<T> {
        let taken = {
            let mut state = self.state.borrow_mut();
            let position = state.attachments.iter().position(|attachment| {
                attachment.key == Some(key) && attachment.value.is::<T>()
            })?;
            state.attachments.remove(position)
        };
        taken.value.downcast::<T>().ok().map(|typed| *typed)
    }

    /// Installs an alternate cancellation routine.
    ///
    /// The next [`Request::cancel`] removes the routine and runs it instead of
    /// aborting the call.
    pub fn add_cancel_override<F>(&self, routine: F)
    where
        F: FnOnce(&Self) + 'static,
    {
        let previous = self
            .state
            .borrow_mut()
            .cancel_override
            .replace(Box::new(routine));
        drop(previous);
    }

    /// Cancels the request.
    ///
    /// Runs the cancel override if one is installed. Otherwise asks the
    /// transport to abort a call still in flight, or tears down immediately
    /// when there is none. Calling this after teardown does nothing.
    pub fn cancel(&self) {
        let (routine, call, transport) = {
            let mut state = self.state.borrow_mut();
            if state.finished {
                return;
            }
            (
                state.cancel_override.take(),
                state.call,
                state.transport.clone(),
            )
        };

        if let Some(routine) = routine {
            trace!(target: REQUEST_TARGET, id = %self.id, "running cancel override");
            routine(self);
            return;
        }
        self.abort_call(call, transport);
    }

    /// Cancels the request, bypassing any cancel override.
    pub(crate) fn abort(&self) {
        let (routine, call, transport) = {
            let mut state = self.state.borrow_mut();
            if state.finished {
                return;
            }
            (
                state.cancel_override.take(),
                state.call,
                state.transport.clone(),
            )
        };
        drop(routine);
        self.abort_call(call, transport);
    }

    fn abort_call(&self, call: Option<CallToken>, transport: Option<Rc<dyn Transport>>) {
        match (call, transport) {
            (Some(token), Some(transport)) => {
                debug!(target: REQUEST_TARGET, id = %self.id, %token, "cancelling call");
                transport.cancel_call(token);
            }
            _ => self.finish(),
        }
    }

    fn mark_completed(&self) {
        self.state.borrow_mut().call = None;
    }

    /// Tears the request down. Later calls do nothing.
    pub(crate) fn finish(&self) {
        let (attachments, owner, transport, routine) = {
            let mut state = self.state.borrow_mut();
            if state.finished {
                return;
            }
            state.finished = true;
            state.call = None;
            (
                mem::take(&mut state.attachments),
                state.owner.take(),
                state.transport.take(),
                state.cancel_override.take(),
            )
        };

        trace!(
            target: REQUEST_TARGET,
            id = %self.id,
            attachments = attachments.len(),
            "tearing down request"
        );
        drop(routine);
        for attachment in attachments {
            attachment.release();
        }
        drop(owner);
        drop(transport);
    }

    fn insert(&self, key: Option<&'static str>, value: Box<dyn Any>, destructor: Option<Destructor>) {
        let attachment = Attachment {
            key,
            value,
            destructor,
        };
        let released = {
            let mut state = self.state.borrow_mut();
            if state.finished {
                // Nothing will tear this request down again.
                Some(attachment)
            } else {
                let slot = key.and_then(|wanted| {
                    state
                        .attachments
                        .iter_mut()
                        .find(|existing| existing.key == Some(wanted))
                });
                match slot {
                    Some(existing) => Some(mem::replace(existing, attachment)),
                    None => {
                        state.attachments.push(attachment);
                        None
                    }
                }
            }
        };
        if let Some(old) = released {
            old.release();
        }
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Request {}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Request");
        debug.field("id", &self.id).field("method", &self.method);
        if let Ok(state) = self.state.try_borrow() {
            debug
                .field("call", &state.call)
                .field("attachments", &state.attachments.len())
                .field("finished", &state.finished);
        }
        debug.finish()
    }
}
