//! Built-in values used when no configuration layer supplies one.

use crate::logging::LogFormat;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Well-known bus name of the telephony service.
pub const DEFAULT_SERVICE_NAME: &str = "org.ofono";

/// Emergency numbers recognised when the network has not supplied a list.
///
/// Covers the GSM defaults (112, 911) plus numbers commonly provisioned on
/// SIMs without an emergency call code file.
pub const DEFAULT_EMERGENCY_NUMBERS: [&str; 8] =
    ["112", "911", "118", "119", "000", "110", "08", "999"];

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    String::from(DEFAULT_LOG_FILTER)
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned bus name for serde and CLI defaults.
#[must_use]
pub fn default_service_name() -> String {
    String::from(DEFAULT_SERVICE_NAME)
}

/// Owned copy of [`DEFAULT_EMERGENCY_NUMBERS`].
#[must_use]
pub fn default_emergency_numbers() -> Vec<String> {
    DEFAULT_EMERGENCY_NUMBERS
        .iter()
        .map(|number| String::from(*number))
        .collect()
}
