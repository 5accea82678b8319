//! Layered configuration for the modem request engine.
//!
//! Values are resolved through `ortho_config`: built-in defaults, then a TOML
//! file named by `--config-path` (or `MODEM_CONFIG_PATH`), then `MODEM_*`
//! environment variables, then command-line flags.
//!
//! # Architecture
//!
//! - [`Config`] is the merged view consumed by the engine and the telemetry
//!   bootstrap.
//! - [`defaults`] holds the built-in values, including the fallback emergency
//!   number list used until the network supplies its own.
//! - [`LogFormat`] and [`LogSettings`] describe log output.

mod defaults;
mod logging;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_EMERGENCY_NUMBERS, DEFAULT_LOG_FILTER, DEFAULT_SERVICE_NAME,
    default_emergency_numbers, default_log_filter, default_log_filter_string, default_log_format,
    default_service_name,
};
pub use logging::{LogFormat, LogFormatParseError, LogSettings};
pub use ortho_config::OrthoConfig;

/// Merged configuration for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "MODEM")]
pub struct Config {
    /// Tracing filter directives, e.g. `info,modem_core=debug`.
    #[ortho_config(default = default_log_filter_string())]
    log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    log_format: LogFormat,
    /// Bus name of the remote telephony service.
    #[ortho_config(default = default_service_name())]
    service_name: String,
    /// Emergency numbers overriding the built-in list; empty keeps the
    /// built-in list.
    #[ortho_config(default = Vec::new())]
    emergency_numbers: Vec<String>,
    /// Timeout handed to the transport for dial requests, in milliseconds.
    dial_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            service_name: default_service_name(),
            emergency_numbers: Vec::new(),
            dial_timeout_ms: None,
        }
    }
}

impl Config {
    /// Tracing filter directives.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Log settings derived from the filter and format.
    #[must_use]
    pub fn log_settings(&self) -> LogSettings {
        LogSettings::new(&self.log_filter, self.log_format)
    }

    /// Bus name of the remote telephony service.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Emergency numbers in effect: the configured list, or the built-in list
    /// when none is configured.
    #[must_use]
    pub fn emergency_numbers(&self) -> Vec<String> {
        if self.emergency_numbers.is_empty() {
            default_emergency_numbers()
        } else {
            self.emergency_numbers.clone()
        }
    }

    /// Transport timeout for dial requests, if configured.
    #[must_use]
    pub fn dial_timeout(&self) -> Option<Duration> {
        self.dial_timeout_ms.map(Duration::from_millis)
    }

    /// Returns a copy with the emergency number list replaced.
    #[must_use]
    pub fn with_emergency_numbers<I, S>(mut self, numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.emergency_numbers = numbers.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a copy with the dial timeout replaced.
    #[must_use]
    pub fn with_dial_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.dial_timeout_ms =
            timeout.map(|value| u64::try_from(value.as_millis()).unwrap_or(u64::MAX));
        self
    }
}
