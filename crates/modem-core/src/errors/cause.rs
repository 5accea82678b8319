//! Call clearing causes and their structured errors.

use strum::{Display, EnumString};

use super::{CallError, CallNetError, CodeSpace, ErrorCode, ModemError};

/// Origin of the last clearing cause reported for a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum CauseType {
    /// No cause reported yet.
    #[default]
    Unknown = 0,
    /// Cleared by the network.
    Network = 1,
    /// Cleared locally.
    Local = 2,
    /// Cleared by the remote party.
    Remote = 3,
}

impl CauseType {
    /// Parses the reason string of a disconnect notification.
    ///
    /// Anything but `network`, `local` or `remote` is [`CauseType::Unknown`].
    #[must_use]
    pub fn from_disconnect_reason(reason: &str) -> Self {
        reason.parse().unwrap_or(Self::Unknown)
    }

    const fn number(self) -> u32 {
        self as u32
    }
}

/// Builds the structured error describing a terminal call cause.
///
/// Cause `0` is [`CallError::NoError`]. Network causes use the network code
/// space, local and remote causes the call code space; unknown codes in
/// either fall back to the domain's generic code.
#[must_use]
pub fn call_cause_error(cause_type: CauseType, cause: u32, context: Option<&str>) -> ModemError {
    let fallback = || format!("Error {cause} with type {}", cause_type.number());

    let (code, text, failure): (ErrorCode, String, bool) = if cause == 0 {
        (CallError::NoError.into(), String::from("None"), false)
    } else {
        match cause_type {
            CauseType::Network => match CallNetError::from_code(cause) {
                Some(code) => {
                    let (text, failure) = code.clearing_text();
                    (code.into(), String::from(text), failure)
                }
                None => (CallNetError::GENERIC.into(), fallback(), false),
            },
            CauseType::Local | CauseType::Remote => {
                match CallError::from_code(cause)
                    .and_then(|code| code.clearing_text().map(|text| (code, text)))
                {
                    Some((code, (text, failure))) => (code.into(), String::from(text), failure),
                    None => (CallError::Generic.into(), fallback(), false),
                }
            }
            CauseType::Unknown => (CallError::Generic.into(), fallback(), false),
        }
    };

    let suffix = if failure { " Error" } else { "" };
    let message = match context {
        Some(context) => format!("{context}: {text}{suffix}"),
        None => format!("{text}{suffix}"),
    };
    ModemError::new(code, message)
}
