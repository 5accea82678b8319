//! Call states and dial options.

use std::fmt;

/// Lifecycle state of one call leg.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CallState {
    /// Unknown or not yet reported.
    #[default]
    Invalid,
    /// Outgoing call being set up.
    Dialing,
    /// Outgoing call ringing at the remote end.
    Alerting,
    /// Incoming call ringing locally.
    Incoming,
    /// Incoming call waiting behind another call.
    Waiting,
    /// Connected.
    Active,
    /// Connected and on local hold.
    Held,
    /// Released.
    Disconnected,
}

impl CallState {
    /// Parses the remote `State` property; anything unrecognised is
    /// [`CallState::Invalid`].
    #[must_use]
    pub fn from_remote(state: Option<&str>) -> Self {
        match state {
            Some("active") => Self::Active,
            Some("held") => Self::Held,
            Some("dialing") => Self::Dialing,
            Some("alerting") => Self::Alerting,
            Some("incoming") => Self::Incoming,
            Some("waiting") => Self::Waiting,
            Some("disconnected") => Self::Disconnected,
            _ => Self::Invalid,
        }
    }

    /// Upper-case name used in logs.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::Dialing => "DIALING",
            Self::Alerting => "ALERTING",
            Self::Incoming => "INCOMING",
            Self::Waiting => "WAITING",
            Self::Active => "ACTIVE",
            Self::Held => "HELD",
            Self::Disconnected => "DISCONNECTED",
        }
    }

    /// Returns `true` for states a live call can be in.
    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Invalid | Self::Disconnected)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Per-call override of calling line identity restriction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ClirOverride {
    /// Use the network default.
    #[default]
    Default,
    /// Hide the caller's number (`#31#`).
    Enabled,
    /// Show the caller's number (`*31#`).
    Disabled,
}

impl ClirOverride {
    /// Argument passed to `Dial`.
    #[must_use]
    pub const fn as_remote(self) -> &'static str {
        match self {
            Self::Default => "",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}
