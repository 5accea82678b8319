//! Construction options for [`super::CallService`].

use std::time::Duration;

use modem_config::Config;

/// Settings the registry takes from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallServiceOptions {
    /// Emergency numbers used until the network supplies its own list.
    pub emergency_numbers: Vec<String>,
    /// Transport timeout for `Dial`; `None` uses the transport default.
    pub dial_timeout: Option<Duration>,
    /// Bus name of the telephony service.
    pub service_name: String,
}

impl From<&Config> for CallServiceOptions {
    fn from(config: &Config) -> Self {
        Self {
            emergency_numbers: config.emergency_numbers(),
            dial_timeout: config.dial_timeout(),
            service_name: String::from(config.service_name()),
        }
    }
}

impl Default for CallServiceOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}
