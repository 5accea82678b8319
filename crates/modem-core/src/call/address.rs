//! Destination address validation and emergency service detection.

use crate::errors::{CallError, ModemError};

use super::ClirOverride;

/// Emergency service URN (RFC 5031).
pub const SOS_URN: &str = "urn:service:sos";

const SHOW_CALLER_PREFIX: &str = "*31#";
const HIDE_CALLER_PREFIX: &str = "#31#";
const NUMBER_CHARS: &str = "0123456789abc*#";
const DIAL_STRING_CHARS: &str = "0123456789abc*#pwPW";
const CALLABLE_CHARS: &str = "+0123456789*#ABCabc";
const MAX_NUMBER_LEN: usize = 20;

/// An address split into the parts `Dial` and DTMF need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAddress {
    /// Callable part.
    pub address: String,
    /// Trailing characters to send as DTMF after connecting.
    pub dial_string: Option<String>,
    /// Override requested by a `*31#` or `#31#` prefix.
    pub clir: ClirOverride,
}

fn span(text: &str, accepted: &str) -> usize {
    text.find(|character: char| !accepted.contains(character))
        .unwrap_or(text.len())
}

fn has_sos_prefix(address: &str) -> bool {
    address
        .as_bytes()
        .get(..SOS_URN.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(SOS_URN.as_bytes()))
}

fn address_problem(address: &str) -> Option<&'static str> {
    if has_sos_prefix(address) {
        return match address.as_bytes().get(SOS_URN.len()) {
            None | Some(b'.') => None,
            Some(_) => Some("invalid service urn"),
        };
    }

    let unprefixed = address
        .strip_prefix(SHOW_CALLER_PREFIX)
        .or_else(|| address.strip_prefix(HIDE_CALLER_PREFIX))
        .unwrap_or(address);
    let number = unprefixed.strip_prefix('+').unwrap_or(unprefixed);

    let digits = span(number, NUMBER_CHARS);
    if digits == 0 {
        return Some(if number.is_empty() {
            "too short"
        } else {
            "not a phone number"
        });
    }
    if digits > MAX_NUMBER_LEN {
        return Some("too long");
    }
    let (callable, rest) = number.split_at(digits);
    if callable.ends_with('#') {
        return Some("invalid service code");
    }

    let dial_string = span(rest, DIAL_STRING_CHARS);
    if dial_string < rest.len() {
        return Some(if dial_string == 0 {
            "invalid address"
        } else {
            "invalid dial string"
        });
    }
    if dial_string == 1 {
        return Some("invalid dial string");
    }
    None
}

/// Returns `true` when `address` can be dialled.
#[must_use]
pub fn is_valid_address(address: &str) -> bool {
    address_problem(address).is_none()
}

/// Checks `address`, explaining why it cannot be dialled.
///
/// # Errors
///
/// Returns a [`CallError::InvalidAddress`] error whose message names the
/// problem, e.g. `too long` or `invalid dial string`.
pub fn validate_address(address: &str) -> Result<(), ModemError> {
    match address_problem(address) {
        Some(problem) => Err(ModemError::new(CallError::InvalidAddress, problem)),
        None => Ok(()),
    }
}

/// Separates the CLIR prefix, callable part and trailing dial string.
///
/// Emergency URNs are returned whole with no dial string.
#[must_use]
pub fn split_address(address: &str) -> SplitAddress {
    if let Some(urn) = valid_emergency_urn(address) {
        return SplitAddress {
            address: String::from(urn),
            dial_string: None,
            clir: ClirOverride::Default,
        };
    }

    let mut clir = ClirOverride::Default;
    let mut rest = address;
    if let Some(stripped) = rest.strip_prefix(SHOW_CALLER_PREFIX) {
        rest = stripped;
        clir = ClirOverride::Disabled;
    }
    if let Some(stripped) = rest.strip_prefix(HIDE_CALLER_PREFIX) {
        rest = stripped;
        clir = ClirOverride::Enabled;
    }

    let (callable, trailing) = rest.split_at(span(rest, CALLABLE_CHARS));
    SplitAddress {
        address: String::from(callable),
        dial_string: (!trailing.is_empty()).then(|| String::from(trailing)),
        clir,
    }
}

/// Recognises `urn:service:sos` and its sub-services.
///
/// A well-formed URN is returned unchanged. A URN with the `sos` prefix but a
/// malformed sub-service collapses to [`SOS_URN`]. Anything else is `None`.
#[must_use]
pub fn valid_emergency_urn(urn: &str) -> Option<&str> {
    if !has_sos_prefix(urn) {
        return None;
    }
    let service = urn.as_bytes().get(SOS_URN.len()..).unwrap_or_default();
    match service.first() {
        None => return Some(urn),
        Some(b'.') => {}
        Some(_) => return None,
    }

    // Label boundaries: a hyphen may not start a label, neither may end one.
    let mut dot = 0;
    let mut hyphen: Option<usize> = None;
    let after_hyphen = |index: usize, hyphen: Option<usize>| {
        hyphen.is_none_or(|position| index > position + 1)
    };
    for index in 1..=service.len() {
        match service.get(index) {
            None if index > dot + 1 && after_hyphen(index, hyphen) => return Some(urn),
            Some(byte) if byte.is_ascii_alphanumeric() => {}
            Some(b'-') if index > dot + 1 => hyphen = Some(index),
            Some(b'.') if index > dot + 1 && after_hyphen(index, hyphen) => dot = index,
            _ => return Some(SOS_URN),
        }
    }
    Some(SOS_URN)
}

/// Emergency service a destination reaches, if any.
///
/// Besides URNs, a destination matches when it starts with one of `numbers`
/// and is followed by nothing or by a pause (`p` or `w`).
#[must_use]
pub fn emergency_service<'a, S: AsRef<str>>(destination: &'a str, numbers: &[S]) -> Option<&'a str> {
    if let Some(urn) = valid_emergency_urn(destination) {
        return Some(urn);
    }
    numbers
        .iter()
        .filter_map(|number| destination.strip_prefix(number.as_ref()))
        .any(|rest| matches!(rest.chars().next(), None | Some('p' | 'w')))
        .then_some(SOS_URN)
}
