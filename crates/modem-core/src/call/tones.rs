//! Signalling tone selection (3GPP TS 22.001 annex F.4).

use crate::errors::{CallError, CallNetError, CauseType, CodeSpace, ErrorDomain, ModemError};

use super::CallState;

/// Abstract tone a user interface should play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    /// Stop any tone in progress.
    Stop,
    /// Leave the current tone alone.
    None,
    /// Remote end is ringing.
    Ringing,
    /// Called party busy.
    Busy,
    /// Network congestion.
    Congestion,
    /// Special information tone.
    SpecialInformation,
    /// Call dropped.
    Dropped,
}

/// Tone matching a call state change.
#[must_use]
pub fn event_tone(state: CallState, cause_type: CauseType, cause: u32) -> Tone {
    match state {
        CallState::Dialing | CallState::Waiting | CallState::Incoming | CallState::Active => {
            Tone::Stop
        }
        CallState::Alerting => Tone::Ringing,
        CallState::Disconnected if cause_type == CauseType::Network => network_tone(cause),
        CallState::Disconnected => call_tone(cause_type, cause),
        CallState::Held | CallState::Invalid => Tone::None,
    }
}

fn network_tone(cause: u32) -> Tone {
    match CallNetError::from_code(cause) {
        Some(CallNetError::NormalCallClearing | CallNetError::UnspecifiedNormal) => Tone::Dropped,
        Some(CallNetError::UserBusy | CallNetError::CallRejected) => Tone::Busy,
        Some(CallNetError::ResponseToStatus) => Tone::None,
        Some(
            CallNetError::NoChannelAvailable
            | CallNetError::TemporaryFailure
            | CallNetError::Congestion
            | CallNetError::ChannelNotAvailable
            | CallNetError::QosNotAvailable
            | CallNetError::BearerCapabilityNotAvailable,
        ) => Tone::Congestion,
        _ => Tone::SpecialInformation,
    }
}

fn call_tone(cause_type: CauseType, cause: u32) -> Tone {
    let local = cause_type == CauseType::Local;
    match CallError::from_code(cause) {
        Some(CallError::ReleaseByUser) if local => Tone::None,
        Some(CallError::ReleaseByUser) => Tone::Dropped,
        Some(CallError::BlacklistBlocked | CallError::BlacklistDelayed) => Tone::Busy,
        Some(CallError::ChannelLoss | CallError::NoService | CallError::NoCoverage) => {
            Tone::Congestion
        }
        Some(CallError::BusyUserRequest) if local => Tone::None,
        _ => Tone::SpecialInformation,
    }
}

/// Tone matching a failed call operation.
#[must_use]
pub fn error_tone(error: Option<&ModemError>) -> Tone {
    let Some(error) = error else {
        return Tone::None;
    };
    let code = error.code().numeric().unwrap_or_default();
    match error.domain() {
        ErrorDomain::CallNetwork => event_tone(CallState::Disconnected, CauseType::Network, code),
        ErrorDomain::Call => event_tone(CallState::Disconnected, CauseType::Remote, code),
        _ => Tone::SpecialInformation,
    }
}
