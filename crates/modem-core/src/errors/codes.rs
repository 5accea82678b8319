//! Enumerated code spaces of the interface-defined error domains.
//!
//! Each enum's discriminant is the wire code and its strum serialization is
//! the symbolic name used in remote exception names.

use std::str::FromStr;

use strum::{EnumIter, EnumString, FromRepr, IntoStaticStr};

use super::ErrorDomain;

/// Common behaviour of every enumerated error code space.
pub trait CodeSpace: Copy + Sized + 'static {
    /// Domain the codes belong to.
    const DOMAIN: ErrorDomain;

    /// Numeric code.
    fn code(self) -> u32;

    /// Symbolic name used after the domain prefix.
    fn nick(self) -> &'static str;

    /// Looks a code up by number.
    fn from_code(code: u32) -> Option<Self>;

    /// Looks a code up by symbolic name (case-sensitive).
    fn from_nick(nick: &str) -> Option<Self>;
}

macro_rules! code_space {
    ($ty:ty, $domain:expr) => {
        impl CodeSpace for $ty {
            const DOMAIN: ErrorDomain = $domain;

            fn code(self) -> u32 {
                u32::from(self as u8)
            }

            fn nick(self) -> &'static str {
                self.into()
            }

            fn from_code(code: u32) -> Option<Self> {
                u8::try_from(code).ok().and_then(Self::from_repr)
            }

            fn from_nick(nick: &str) -> Option<Self> {
                Self::from_str(nick).ok()
            }
        }
    };
}

/// Errors raised by the telephony service itself (`org.ofono.Error`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr, FromRepr,
)]
#[repr(u8)]
#[expect(missing_docs, reason = "variant names mirror the remote error names")]
pub enum OfonoError {
    Failed = 0,
    InvalidArguments,
    InvalidFormat,
    NotImplemented,
    NotSupported,
    InProgress,
    NotFound,
    NotActive,
    #[strum(serialize = "Timedout")]
    TimedOut,
    SimNotReady,
    InUse,
    NotAttached,
    AttachInProgress,
}

/// Local and remote call clearing causes (`org.ofono.Bogus.Call`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr, FromRepr,
)]
#[repr(u8)]
#[expect(missing_docs, reason = "variant names mirror the remote error names")]
pub enum CallError {
    #[strum(serialize = "None")]
    NoError = 0,
    NoCall,
    ReleaseByUser,
    BusyUserRequest,
    #[strum(serialize = "RequestError")]
    ErrorRequest,
    CallActive,
    NoCallActive,
    InvalidCallMode,
    TooLongAddress,
    InvalidAddress,
    Emergency,
    NoService,
    NoCoverage,
    CodeRequired,
    NotAllowed,
    #[strum(serialize = "DTMFError")]
    DtmfError,
    ChannelLoss,
    #[strum(serialize = "FDNNotOk")]
    FdnNotOk,
    BlacklistBlocked,
    BlacklistDelayed,
    EmergencyFailure,
    #[strum(serialize = "NoSIM")]
    NoSim,
    #[strum(serialize = "DTMFSendOngoing")]
    DtmfSendOngoing,
    #[strum(serialize = "CSInactive")]
    CsInactive,
    NotReady,
    IncompatibleDest,
    Generic,
}

impl CallError {
    /// Human text for a clearing cause and whether it reads as a failure.
    #[must_use]
    pub const fn clearing_text(self) -> Option<(&'static str, bool)> {
        let text = match self {
            Self::NoCall => ("No Call", true),
            Self::ReleaseByUser => ("Release By User", false),
            Self::BusyUserRequest => ("Busy User Request", true),
            Self::ErrorRequest => ("Request", true),
            Self::CallActive => ("Call Active", true),
            Self::NoCallActive => ("No Call Active", true),
            Self::InvalidCallMode => ("Invalid Call Mode", true),
            Self::TooLongAddress => ("Too Long Address", true),
            Self::InvalidAddress => ("Invalid Address", true),
            Self::Emergency => ("Emergency", true),
            Self::NoService => ("No Service", true),
            Self::NoCoverage => ("No Coverage", true),
            Self::CodeRequired => ("Code Required", true),
            Self::NotAllowed => ("Not Allowed", true),
            Self::DtmfError => ("DTMF Error", true),
            Self::ChannelLoss => ("Channel Loss", true),
            Self::FdnNotOk => ("FDN Not Ok", true),
            Self::BlacklistBlocked => ("Blacklist Blocked", true),
            Self::BlacklistDelayed => ("Blacklist Delayed", true),
            Self::EmergencyFailure => ("Emergency Failure", true),
            Self::NoSim => ("No SIM", true),
            Self::DtmfSendOngoing => ("DTMF Send Ongoing", true),
            Self::CsInactive => ("CS Inactive", true),
            Self::NotReady => ("Not Ready", true),
            Self::IncompatibleDest => ("Incompatible Dest", true),
            Self::NoError | Self::Generic => return None,
        };
        Some(text)
    }
}

/// Network clearing causes from 3GPP TS 24.008 (`org.ofono.Bogus.Call.Network`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr, FromRepr,
)]
#[repr(u8)]
#[expect(missing_docs, reason = "variant names mirror the remote error names")]
pub enum CallNetError {
    UnassignedNumber = 0x01,
    NoRouteToDestination = 0x03,
    ChannelUnacceptable = 0x06,
    OperatorDeterminedBarring = 0x08,
    NormalCallClearing = 0x10,
    UserBusy = 0x11,
    NoUserResponse = 0x12,
    AlertNoAnswer = 0x13,
    CallRejected = 0x15,
    NumberChanged = 0x16,
    NonSelectedClearing = 0x1A,
    DestinationOutOfOrder = 0x1B,
    InvalidNumber = 0x1C,
    FacilityRejected = 0x1D,
    ResponseToStatus = 0x1E,
    UnspecifiedNormal = 0x1F,
    NoChannelAvailable = 0x22,
    NetworkOutOfOrder = 0x26,
    TemporaryFailure = 0x29,
    Congestion = 0x2A,
    AccessInformationDiscarded = 0x2B,
    ChannelNotAvailable = 0x2C,
    ResourcesNotAvailable = 0x2F,
    #[strum(serialize = "QoSNotAvailable")]
    QosNotAvailable = 0x31,
    RequestedFacilityNotSubscribed = 0x32,
    #[strum(serialize = "IncomingCallsBarredWithinCUG")]
    IncomingCallsBarredWithinCug = 0x37,
    BearerCapabilityUnauthorized = 0x39,
    BearerCapabilityNotAvailable = 0x3A,
    ServiceNotAvailable = 0x3F,
    BearerNotImplemented = 0x41,
    #[strum(serialize = "ACMMax")]
    AcmMax = 0x44,
    FacilityNotImplemented = 0x45,
    #[strum(serialize = "OnlyRestrictedDIBearerCapability")]
    OnlyRestrictedDiBearerCapability = 0x46,
    ServiceNotImplemented = 0x4F,
    InvalidTransactionIdentifier = 0x51,
    #[strum(serialize = "NotInCUG")]
    NotInCug = 0x57,
    IncompatibleDestination = 0x58,
    InvalidTransitNetSelected = 0x5B,
    SemanticalError = 0x5F,
    InvalidMandatoryInformation = 0x60,
    MessageTypeNonExistent = 0x61,
    MessageTypeIncompatible = 0x62,
    InformationElementNonExistent = 0x63,
    ConditionalInformationElementError = 0x64,
    IncompatibleMessage = 0x65,
    TimerExpiry = 0x66,
    ProtocolError = 0x6F,
    /// Cause unknown because of interworking; doubles as the generic code.
    #[strum(serialize = "Generic")]
    Interworking = 0x7F,
}

impl CallNetError {
    /// Fallback code for causes outside the table.
    pub const GENERIC: Self = Self::Interworking;

    /// Human text for a clearing cause and whether it reads as a failure.
    #[must_use]
    pub const fn clearing_text(self) -> (&'static str, bool) {
        match self {
            Self::UnassignedNumber => ("Unassigned Number", true),
            Self::NoRouteToDestination => ("No Route To Destination", true),
            Self::ChannelUnacceptable => ("Channel Unacceptable", true),
            Self::OperatorDeterminedBarring => ("Operator Determined Barring", true),
            Self::NormalCallClearing => ("Normal Call Clearing", false),
            Self::UserBusy => ("User Busy", false),
            Self::NoUserResponse => ("No User Response", true),
            Self::AlertNoAnswer => ("Alert No Answer", true),
            Self::CallRejected => ("Call Rejected", true),
            Self::NumberChanged => ("Number Changed", true),
            Self::NonSelectedClearing => ("Non-Selected Clearing", true),
            Self::DestinationOutOfOrder => ("Destination Out Of Order", true),
            Self::InvalidNumber => ("Invalid Number", true),
            Self::FacilityRejected => ("Facility Rejected", true),
            Self::ResponseToStatus => ("Response To Status", false),
            Self::UnspecifiedNormal => ("Unspecified Normal", false),
            Self::NoChannelAvailable => ("No Channel Available", true),
            Self::NetworkOutOfOrder => ("Network Out Of Order", true),
            Self::TemporaryFailure => ("Temporary Failure", false),
            Self::Congestion => ("Congestion", true),
            Self::AccessInformationDiscarded => ("Access Information Discarded", true),
            Self::ChannelNotAvailable => ("Channel Not Available", true),
            Self::ResourcesNotAvailable => ("Resources Not Available", true),
            Self::QosNotAvailable => ("QoS Not Available", true),
            Self::RequestedFacilityNotSubscribed => ("Requested Facility Not Subscribed", true),
            Self::IncomingCallsBarredWithinCug => ("Incoming Calls Barred Within CUG", true),
            Self::BearerCapabilityUnauthorized => ("Bearer Capability Unauthorized", true),
            Self::BearerCapabilityNotAvailable => ("Bearer Capability Not Available", true),
            Self::ServiceNotAvailable => ("Service Not Available", true),
            Self::BearerNotImplemented => ("Bearer Not Implemented", true),
            Self::AcmMax => ("ACM Max", true),
            Self::FacilityNotImplemented => ("Facility Not Implemented", true),
            Self::OnlyRestrictedDiBearerCapability => {
                ("Only Restricted DI Bearer Capability", true)
            }
            Self::ServiceNotImplemented => ("Service Not Implemented", true),
            Self::InvalidTransactionIdentifier => ("Invalid Transaction Identifier", true),
            Self::NotInCug => ("Not In CUG", true),
            Self::IncompatibleDestination => ("Incompatible Destination", true),
            Self::InvalidTransitNetSelected => ("Invalid Transit Net Selected", true),
            Self::SemanticalError => ("Semantical", true),
            Self::InvalidMandatoryInformation => ("Invalid Mandatory Information", true),
            Self::MessageTypeNonExistent => ("Message Type Non-Existent", true),
            Self::MessageTypeIncompatible => ("Message Type Incompatible", true),
            Self::InformationElementNonExistent => ("Information Element Non-Existent", true),
            Self::ConditionalInformationElementError => ("Conditional Information Element", true),
            Self::IncompatibleMessage => ("Incompatible Message", true),
            Self::TimerExpiry => ("Timer Expiry", true),
            Self::ProtocolError => ("Protocol", true),
            Self::Interworking => ("Error Cause Not Known Because of Interworking", false),
        }
    }
}

/// Message-service failures reported by the modem (`org.ofono.Bogus.SMS`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr, FromRepr,
)]
#[repr(u8)]
#[expect(missing_docs, reason = "variant names mirror the remote error names")]
pub enum SmsError {
    RoutingReleased = 0x01,
    InvalidParameter = 0x02,
    DeviceFailure = 0x03,
    #[strum(serialize = "PointToPointReserved")]
    PpReserved = 0x04,
    RouteNotAvailable = 0x05,
    RouteNotAllowed = 0x06,
    ServiceReserved = 0x07,
    InvalidLocation = 0x08,
    #[strum(serialize = "NoNetworkResponse")]
    NoNetwResponse = 0x0B,
    #[strum(serialize = "DestinationAddressFDNRestricted")]
    DestAddrFdnRestricted = 0x0C,
    #[strum(serialize = "SMSCAddressFDNRestricted")]
    SmscAddrFdnRestricted = 0x0D,
    ResendAlreadyDone = 0x0E,
    #[strum(serialize = "SMSCAddressNotAvailable")]
    SmscAddrNotAvailable = 0x0F,
    RoutingFailed = 0x10,
    #[strum(serialize = "CSInactive")]
    CsInactive = 0x11,
    SendingOngoing = 0x15,
    ServerNotReady = 0x16,
    NoTransaction = 0x17,
    #[strum(serialize = "InvalidSubscriptionNumber")]
    InvalidSubscriptionNr = 0x19,
    ReceptionFailed = 0x1A,
    #[strum(serialize = "RCRejected")]
    RcRejected = 0x1B,
    AllSubscriptionsAllocated = 0x1C,
    SubjectCountOverflow = 0x1D,
    #[strum(serialize = "DCSCountOverflow")]
    DcsCountOverflow = 0x1E,
}

/// Relay-layer and lower-layer SMS causes from 3GPP TS 24.011
/// (`org.ofono.Bogus.SMS.Network`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr, FromRepr,
)]
#[repr(u8)]
#[expect(missing_docs, reason = "variant names mirror the remote error names")]
pub enum SmsNetError {
    Success = 0x00,
    UnassignedNumber = 0x01,
    OperatorDeterminedBarring = 0x08,
    CallBarred = 0x0A,
    Reserved = 0x0B,
    MessageTransferRejected = 0x15,
    MemoryCapacityExceeded = 0x16,
    DestinationOutOfOrder = 0x1B,
    UndefinedSubscriber = 0x1C,
    FacilityRejected = 0x1D,
    UnknownSubscriber = 0x1E,
    NetworkOutOfOrder = 0x26,
    TemporaryFailure = 0x29,
    Congestion = 0x2A,
    ResourceUnavailable = 0x2F,
    RequiredFacilityNotSubscribed = 0x32,
    RequiredFacilityNotImplemented = 0x45,
    InvalidReferenceValue = 0x51,
    InvalidMessage = 0x5F,
    InvalidMandatoryInfoElement = 0x60,
    InvalidMessageType = 0x61,
    IncompatibleMessageType = 0x62,
    InvalidInfoElementType = 0x63,
    ProtocolError = 0x6F,
    InterworkingError = 0x7F,
    LowLayerUnknown = 0x80,
    #[strum(serialize = "IMSIUnknownInHLR")]
    ImsiUnknownInHlr = 0x82,
    #[strum(serialize = "IllegalMS")]
    IllegalMs = 0x83,
    #[strum(serialize = "IMSIUnknownInVLR")]
    ImsiUnknownInVlr = 0x84,
    #[strum(serialize = "IMEINotAccepted")]
    ImeiNotAccepted = 0x85,
    #[strum(serialize = "IllegalME")]
    IllegalMe = 0x86,
    #[strum(serialize = "PLMNNotAllowed")]
    PlmnNotAllowed = 0x8B,
    LocationAreaNotAllowed = 0x8C,
    RoamingNotAllowedInThisLocationArea = 0x8D,
    NoSuitableCellsInThisLocationArea = 0x8F,
    NetworkFailure = 0x91,
    MacFailure = 0x94,
    SyncFailure = 0x95,
    LowLayerCongestion = 0x96,
    AuthUnacceptable = 0x97,
    ServiceOptionNotSupported = 0xA0,
    ServiceOptionNotSubscribed = 0xA1,
    ServiceOptionTemporarilyOutOfOrder = 0xA2,
    CallCannotBeIdentified = 0xA6,
    LowLayerInvalidMessage = 0xDF,
    LowLayerInvalidMandatoryInfoElement = 0xE0,
    LowLayerInvalidMessageType = 0xE1,
    LowLayerIncompatibleMessageType = 0xE2,
    #[strum(serialize = "LowLayerInvalidIEType")]
    LowLayerInvalidIeType = 0xE3,
    #[strum(serialize = "LowLayerInvalidIE")]
    LowLayerInvalidIe = 0xE4,
    LowLayerIncompatibleMessage = 0xE5,
    #[strum(serialize = "CSBarred")]
    CsBarred = 0xE8,
    LowLayerProtocolError = 0xEF,
}

code_space!(OfonoError, ErrorDomain::Ofono);
code_space!(CallError, ErrorDomain::Call);
code_space!(CallNetError, ErrorDomain::CallNetwork);
code_space!(SmsError, ErrorDomain::Sms);
code_space!(SmsNetError, ErrorDomain::SmsNetwork);
