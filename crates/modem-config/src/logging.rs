//! Log output settings shared by every process that embeds the engine.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::defaults::DEFAULT_LOG_FILTER;

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, flattened for log shippers.
    #[default]
    Json,
    /// Single-line human-readable output.
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

/// Resolved log settings handed to the telemetry bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    filter: String,
    format: LogFormat,
}

impl LogSettings {
    /// Builds settings from a filter expression and output format.
    ///
    /// A blank filter falls back to [`DEFAULT_LOG_FILTER`].
    #[must_use]
    pub fn new(filter: &str, format: LogFormat) -> Self {
        let trimmed = filter.trim();
        let filter = if trimmed.is_empty() {
            DEFAULT_LOG_FILTER
        } else {
            trimmed
        };
        Self {
            filter: String::from(filter),
            format,
        }
    }

    /// `EnvFilter` directive string.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Output format.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_FILTER, LogFormat::default())
    }
}
