//! Error taxonomy shared by every remote operation.
//!
//! Remote failures arrive as generic "remote exception" errors whose name is
//! `<domain prefix>.<symbolic name>`. [`ModemError::decode_remote_exception`]
//! maps such a name back onto one of the enumerated code spaces in [`codes`];
//! anything it cannot map stays an opaque transport error so callers never
//! lose the original name.

mod cause;
pub mod codes;
mod local;

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;
use tracing::debug;

pub use cause::{CauseType, call_cause_error};
pub use codes::{CallError, CallNetError, CodeSpace, OfonoError, SmsError, SmsNetError};
pub use local::{DialStringProblem, LocalError};

const ERRORS_TARGET: &str = "modem_core::errors";

/// Error domains and their remote name prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    /// Failures of the transport itself.
    Transport,
    /// Errors defined by the telephony service.
    Ofono,
    /// Local and remote call clearing causes.
    Call,
    /// Network call clearing causes.
    CallNetwork,
    /// Message-service failures.
    Sms,
    /// Message-service network causes.
    SmsNetwork,
}

impl ErrorDomain {
    /// Domains whose names can be decoded from a remote exception.
    pub const REMOTE: [Self; 5] = [
        Self::Ofono,
        Self::Call,
        Self::CallNetwork,
        Self::Sms,
        Self::SmsNetwork,
    ];

    /// Prefix placed before the symbolic name.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Transport => "org.freedesktop.DBus.Error",
            Self::Ofono => "org.ofono.Error",
            Self::Call => "org.ofono.Bogus.Call",
            Self::CallNetwork => "org.ofono.Bogus.Call.Network",
            Self::Sms => "org.ofono.Bogus.SMS",
            Self::SmsNetwork => "org.ofono.Bogus.SMS.Network",
        }
    }

    fn code_for_nick(self, nick: &str) -> Option<ErrorCode> {
        match self {
            Self::Transport => None,
            Self::Ofono => OfonoError::from_nick(nick).map(ErrorCode::Ofono),
            Self::Call => CallError::from_nick(nick).map(ErrorCode::Call),
            Self::CallNetwork => CallNetError::from_nick(nick).map(ErrorCode::CallNetwork),
            Self::Sms => SmsError::from_nick(nick).map(ErrorCode::Sms),
            Self::SmsNetwork => SmsNetError::from_nick(nick).map(ErrorCode::SmsNetwork),
        }
    }
}

impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Failures reported by the transport rather than the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransportFault {
    /// Generic failure.
    Failed,
    /// Out of memory.
    NoMemory,
    /// The remote service is not running.
    ServiceUnknown,
    /// The bus name has no owner.
    NameHasNoOwner,
    /// No reply arrived before the timeout.
    NoReply,
    /// Input/output failure on the link.
    IoError,
    /// The operation is not supported.
    NotSupported,
    /// Access was denied by policy.
    AccessDenied,
    /// The connection timed out.
    Timeout,
    /// The link was lost.
    Disconnected,
    /// Arguments were rejected.
    InvalidArgs,
    /// The remote object has no such method.
    UnknownMethod,
    /// The call timed out.
    TimedOut,
    /// A remote exception whose name did not map to a known code.
    RemoteException {
        /// Fully qualified remote exception name.
        name: String,
    },
}

impl TransportFault {
    fn name(&self) -> &str {
        match self {
            Self::Failed => "Failed",
            Self::NoMemory => "NoMemory",
            Self::ServiceUnknown => "ServiceUnknown",
            Self::NameHasNoOwner => "NameHasNoOwner",
            Self::NoReply => "NoReply",
            Self::IoError => "IOError",
            Self::NotSupported => "NotSupported",
            Self::AccessDenied => "AccessDenied",
            Self::Timeout => "Timeout",
            Self::Disconnected => "Disconnected",
            Self::InvalidArgs => "InvalidArgs",
            Self::UnknownMethod => "UnknownMethod",
            Self::TimedOut => "TimedOut",
            Self::RemoteException { name } => name,
        }
    }
}

/// Structured code of a [`ModemError`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Transport-layer failure.
    Transport(TransportFault),
    /// Telephony service error.
    Ofono(OfonoError),
    /// Local or remote call cause.
    Call(CallError),
    /// Network call cause.
    CallNetwork(CallNetError),
    /// Message-service failure.
    Sms(SmsError),
    /// Message-service network cause.
    SmsNetwork(SmsNetError),
}

impl ErrorCode {
    /// Domain of this code.
    #[must_use]
    pub const fn domain(&self) -> ErrorDomain {
        match self {
            Self::Transport(_) => ErrorDomain::Transport,
            Self::Ofono(_) => ErrorDomain::Ofono,
            Self::Call(_) => ErrorDomain::Call,
            Self::CallNetwork(_) => ErrorDomain::CallNetwork,
            Self::Sms(_) => ErrorDomain::Sms,
            Self::SmsNetwork(_) => ErrorDomain::SmsNetwork,
        }
    }

    /// Symbolic name within the domain.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Transport(fault) => fault.name(),
            Self::Ofono(code) => code.nick(),
            Self::Call(code) => code.nick(),
            Self::CallNetwork(code) => code.nick(),
            Self::Sms(code) => code.nick(),
            Self::SmsNetwork(code) => code.nick(),
        }
    }

    /// Numeric code for the enumerated domains.
    #[must_use]
    pub fn numeric(&self) -> Option<u32> {
        match self {
            Self::Transport(_) => None,
            Self::Ofono(code) => Some(code.code()),
            Self::Call(code) => Some(code.code()),
            Self::CallNetwork(code) => Some(code.code()),
            Self::Sms(code) => Some(code.code()),
            Self::SmsNetwork(code) => Some(code.code()),
        }
    }
}

impl From<OfonoError> for ErrorCode {
    fn from(code: OfonoError) -> Self {
        Self::Ofono(code)
    }
}

impl From<CallError> for ErrorCode {
    fn from(code: CallError) -> Self {
        Self::Call(code)
    }
}

impl From<CallNetError> for ErrorCode {
    fn from(code: CallNetError) -> Self {
        Self::CallNetwork(code)
    }
}

impl From<SmsError> for ErrorCode {
    fn from(code: SmsError) -> Self {
        Self::Sms(code)
    }
}

impl From<SmsNetError> for ErrorCode {
    fn from(code: SmsNetError) -> Self {
        Self::SmsNetwork(code)
    }
}

impl From<TransportFault> for ErrorCode {
    fn from(fault: TransportFault) -> Self {
        Self::Transport(fault)
    }
}

/// Error delivered to completion callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ModemError {
    code: ErrorCode,
    message: String,
}

impl ModemError {
    /// Builds an error from a structured code and message.
    #[must_use]
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Builds a transport-layer error.
    #[must_use]
    pub fn transport(fault: TransportFault, message: impl Into<String>) -> Self {
        Self::new(fault, message)
    }

    /// Builds an undecoded remote exception.
    #[must_use]
    pub fn remote_exception(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            TransportFault::RemoteException { name: name.into() },
            message,
        )
    }

    /// Decodes `"<text>\0<prefix>.<name>"` into a structured error.
    ///
    /// A domain matches only when nothing after `<prefix>.` contains a
    /// further `.`. Unknown domains or names yield an opaque
    /// [`TransportFault::RemoteException`].
    #[must_use]
    pub fn decode_remote_exception(encoded: &str) -> Self {
        let (text, name) = encoded.split_once('\0').unwrap_or((encoded, ""));
        Self::remote_exception(name, text).fixed()
    }

    /// Maps an undecoded remote exception onto its enumerated code.
    ///
    /// Other errors are returned unchanged.
    #[must_use]
    pub fn fixed(self) -> Self {
        let ErrorCode::Transport(TransportFault::RemoteException { name }) = &self.code else {
            return self;
        };
        match resolve_remote_name(name) {
            Some(code) => Self {
                code,
                message: self.message,
            },
            None => self,
        }
    }

    /// Structured code.
    #[must_use]
    pub const fn code(&self) -> &ErrorCode {
        &self.code
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Domain of the code.
    #[must_use]
    pub const fn domain(&self) -> ErrorDomain {
        self.code.domain()
    }

    /// Prefix of the code's domain.
    #[must_use]
    pub const fn domain_prefix(&self) -> &'static str {
        self.domain().prefix()
    }

    /// Symbolic name within the domain.
    #[must_use]
    pub fn name(&self) -> &str {
        self.code.name()
    }

    /// Fully qualified remote name, `<prefix>.<name>`.
    ///
    /// Undecoded remote exceptions report the name they arrived with.
    #[must_use]
    pub fn fqn(&self) -> Cow<'_, str> {
        match &self.code {
            ErrorCode::Transport(TransportFault::RemoteException { name }) => {
                Cow::Borrowed(name.as_str())
            }
            code => Cow::Owned(format!("{}.{}", code.domain().prefix(), code.name())),
        }
    }

    /// Encodes the error the way a remote exception carries it.
    #[must_use]
    pub fn encode_remote_exception(&self) -> String {
        format!("{}\0{}", self.message, self.fqn())
    }

    /// Returns `true` for transport-layer errors, including undecoded remote
    /// exceptions.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self.code, ErrorCode::Transport(_))
    }

    /// Prepends `context` to the message.
    #[must_use]
    pub fn with_context(mut self, context: &str) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }
}

fn resolve_remote_name(name: &str) -> Option<ErrorCode> {
    let matched = ErrorDomain::REMOTE.into_iter().find_map(|domain| {
        let nick = name.strip_prefix(domain.prefix())?.strip_prefix('.')?;
        (!nick.contains('.')).then_some((domain, nick))
    });
    let Some((domain, nick)) = matched else {
        debug!(target: ERRORS_TARGET, name, "no domain matches remote exception");
        return None;
    };
    let code = domain.code_for_nick(nick);
    if code.is_none() {
        debug!(target: ERRORS_TARGET, name, %domain, "no code point for remote exception");
    }
    code
}
