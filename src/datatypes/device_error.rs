use num_enum::TryFromPrimitive;
use std::fmt;

/// Message service failure result codes reported by the modem as
/// `+CMS ERROR: <n>` (3GPP TS 27.005, section 3.2.5). Values 0..=127 are
/// network cause codes relayed from the SMSC, 300 and above come from the
/// mobile equipment itself.
#[derive(TryFromPrimitive)]
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CmsError {
    UnassignedNumber = 1,
    OperatorDeterminedBarring = 8,
    CallBarred = 10,
    TransferRejected = 21,
    DestinationOutOfService = 27,
    UnidentifiedSubscriber = 28,
    FacilityRejected = 29,
    UnknownSubscriber = 30,
    NetworkOutOfOrder = 38,
    TemporaryFailure = 41,
    Congestion = 42,
    ResourcesUnavailable = 47,
    FacilityNotSubscribed = 50,
    FacilityNotImplemented = 69,
    InvalidTransferReference = 81,
    InvalidMessage = 95,
    InvalidMandatoryInformation = 96,
    MessageTypeNotImplemented = 97,
    MessageNotCompatible = 98,
    InformationElementNotImplemented = 99,
    ProtocolError = 111,
    Interworking = 127,
    TelematicInterworkingNotSupported = 128,
    ShortMessageType0NotSupported = 129,
    CannotReplaceShortMessage = 130,
    UnspecifiedTpPidError = 143,
    DataCodingSchemeNotSupported = 144,
    MessageClassNotSupported = 145,
    UnspecifiedTpDcsError = 159,
    CommandCannotBeActioned = 160,
    CommandUnsupported = 161,
    UnspecifiedTpCommandError = 175,
    TpduNotSupported = 176,
    ScBusy = 192,
    NoScSubscription = 193,
    ScSystemFailure = 194,
    InvalidSmeAddress = 195,
    DestinationSmeBarred = 196,
    DuplicateRejected = 197,
    TpVpfNotSupported = 198,
    TpVpNotSupported = 199,
    SimStorageFull = 208,
    NoStorageInSim = 209,
    ErrorInMs = 210,
    MemoryCapacityExceeded = 211,
    UnspecifiedErrorCause = 255,
    MeFailure = 300,
    SmsServiceReserved = 301,
    OperationNotAllowed = 302,
    OperationNotSupported = 303,
    InvalidPduModeParameter = 304,
    InvalidTextModeParameter = 305,
    SimNotInserted = 310,
    SimPinRequired = 311,
    PhSimPinRequired = 312,
    SimFailure = 313,
    SimBusy = 314,
    SimWrong = 315,
    SimPukRequired = 316,
    SimPin2Required = 317,
    SimPuk2Required = 318,
    MemoryFailure = 320,
    InvalidMemoryIndex = 321,
    MemoryFull = 322,
    SmscAddressUnknown = 330,
    NoNetworkService = 331,
    NetworkTimeout = 332,
    NoCnmaExpected = 340,
    UnknownError = 500,
}

impl CmsError {
    pub fn description(&self) -> &'static str {
        match self {
            CmsError::UnassignedNumber => "Unassigned (unallocated) number",
            CmsError::OperatorDeterminedBarring => "Operator determined barring",
            CmsError::CallBarred => "Call barred",
            CmsError::TransferRejected => "Short message transfer rejected",
            CmsError::DestinationOutOfService => "Destination out of service",
            CmsError::UnidentifiedSubscriber => "Unidentified subscriber",
            CmsError::FacilityRejected => "Facility rejected",
            CmsError::UnknownSubscriber => "Unknown subscriber",
            CmsError::NetworkOutOfOrder => "Network out of order",
            CmsError::TemporaryFailure => "Temporary failure",
            CmsError::Congestion => "Congestion",
            CmsError::ResourcesUnavailable => "Resources unavailable, unspecified",
            CmsError::FacilityNotSubscribed => "Requested facility not subscribed",
            CmsError::FacilityNotImplemented => "Requested facility not implemented",
            CmsError::InvalidTransferReference => {
                "Invalid short message transfer reference value"
            }
            CmsError::InvalidMessage => "Invalid message, unspecified",
            CmsError::InvalidMandatoryInformation => "Invalid mandatory information",
            CmsError::MessageTypeNotImplemented => "Message type non-existent or not implemented",
            CmsError::MessageNotCompatible => {
                "Message not compatible with short message protocol state"
            }
            CmsError::InformationElementNotImplemented => {
                "Information element non-existent or not implemented"
            }
            CmsError::ProtocolError => "Protocol error, unspecified",
            CmsError::Interworking => "Interworking, unspecified",
            CmsError::TelematicInterworkingNotSupported => "Telematic interworking not supported",
            CmsError::ShortMessageType0NotSupported => "Short message type 0 not supported",
            CmsError::CannotReplaceShortMessage => "Cannot replace short message",
            CmsError::UnspecifiedTpPidError => "Unspecified TP-PID error",
            CmsError::DataCodingSchemeNotSupported => "Data coding scheme (alphabet) not supported",
            CmsError::MessageClassNotSupported => "Message class not supported",
            CmsError::UnspecifiedTpDcsError => "Unspecified TP-DCS error",
            CmsError::CommandCannotBeActioned => "Command cannot be actioned",
            CmsError::CommandUnsupported => "Command unsupported",
            CmsError::UnspecifiedTpCommandError => "Unspecified TP-Command error",
            CmsError::TpduNotSupported => "TPDU not supported",
            CmsError::ScBusy => "SC busy",
            CmsError::NoScSubscription => "No SC subscription",
            CmsError::ScSystemFailure => "SC system failure",
            CmsError::InvalidSmeAddress => "Invalid SME address",
            CmsError::DestinationSmeBarred => "Destination SME barred",
            CmsError::DuplicateRejected => "SM rejected, duplicate SM",
            CmsError::TpVpfNotSupported => "TP-VPF not supported",
            CmsError::TpVpNotSupported => "TP-VP not supported",
            CmsError::SimStorageFull => "SIM SMS storage full",
            CmsError::NoStorageInSim => "No SMS storage capability in SIM",
            CmsError::ErrorInMs => "Error in MS",
            CmsError::MemoryCapacityExceeded => "Memory capacity exceeded",
            CmsError::UnspecifiedErrorCause => "Unspecified error cause",
            CmsError::MeFailure => "ME failure",
            CmsError::SmsServiceReserved => "SMS service of ME reserved",
            CmsError::OperationNotAllowed => "Operation not allowed",
            CmsError::OperationNotSupported => "Operation not supported",
            CmsError::InvalidPduModeParameter => "Invalid PDU mode parameter",
            CmsError::InvalidTextModeParameter => "Invalid text mode parameter",
            CmsError::SimNotInserted => "SIM not inserted",
            CmsError::SimPinRequired => "SIM PIN required",
            CmsError::PhSimPinRequired => "PH-SIM PIN required",
            CmsError::SimFailure => "SIM failure",
            CmsError::SimBusy => "SIM busy",
            CmsError::SimWrong => "SIM wrong",
            CmsError::SimPukRequired => "SIM PUK required",
            CmsError::SimPin2Required => "SIM PIN2 required",
            CmsError::SimPuk2Required => "SIM PUK2 required",
            CmsError::MemoryFailure => "Memory failure",
            CmsError::InvalidMemoryIndex => "Invalid memory index",
            CmsError::MemoryFull => "Memory full",
            CmsError::SmscAddressUnknown => "SMSC address unknown",
            CmsError::NoNetworkService => "No network service",
            CmsError::NetworkTimeout => "Network timeout",
            CmsError::NoCnmaExpected => "No +CNMA acknowledgement expected",
            CmsError::UnknownError => "Unknown error",
        }
    }
}

/// Equipment failure result codes reported as `+CME ERROR: <n>`
/// (3GPP TS 27.007, section 9.2).
#[derive(TryFromPrimitive)]
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CmeError {
    PhoneFailure = 0,
    NoConnectionToPhone = 1,
    PhoneAdaptorLinkReserved = 2,
    OperationNotAllowed = 3,
    OperationNotSupported = 4,
    PhSimPinRequired = 5,
    SimNotInserted = 10,
    SimPinRequired = 11,
    SimPukRequired = 12,
    SimFailure = 13,
    SimBusy = 14,
    SimWrong = 15,
    IncorrectPassword = 16,
    SimPin2Required = 17,
    SimPuk2Required = 18,
    MemoryFull = 20,
    InvalidIndex = 21,
    NotFound = 22,
    MemoryFailure = 23,
    TextStringTooLong = 24,
    InvalidCharactersInText = 25,
    DialStringTooLong = 26,
    InvalidCharactersInDialString = 27,
    NoNetworkService = 30,
    NetworkTimeout = 31,
    EmergencyCallsOnly = 32,
    Unknown = 100,
}

impl CmeError {
    pub fn description(&self) -> &'static str {
        match self {
            CmeError::PhoneFailure => "Phone failure",
            CmeError::NoConnectionToPhone => "No connection to phone",
            CmeError::PhoneAdaptorLinkReserved => "Phone-adaptor link reserved",
            CmeError::OperationNotAllowed => "Operation not allowed",
            CmeError::OperationNotSupported => "Operation not supported",
            CmeError::PhSimPinRequired => "PH-SIM PIN required",
            CmeError::SimNotInserted => "SIM not inserted",
            CmeError::SimPinRequired => "SIM PIN required",
            CmeError::SimPukRequired => "SIM PUK required",
            CmeError::SimFailure => "SIM failure",
            CmeError::SimBusy => "SIM busy",
            CmeError::SimWrong => "SIM wrong",
            CmeError::IncorrectPassword => "Incorrect password",
            CmeError::SimPin2Required => "SIM PIN2 required",
            CmeError::SimPuk2Required => "SIM PUK2 required",
            CmeError::MemoryFull => "Memory full",
            CmeError::InvalidIndex => "Invalid index",
            CmeError::NotFound => "Not found",
            CmeError::MemoryFailure => "Memory failure",
            CmeError::TextStringTooLong => "Text string too long",
            CmeError::InvalidCharactersInText => "Invalid characters in text string",
            CmeError::DialStringTooLong => "Dial string too long",
            CmeError::InvalidCharactersInDialString => "Invalid characters in dial string",
            CmeError::NoNetworkService => "No network service",
            CmeError::NetworkTimeout => "Network timeout",
            CmeError::EmergencyCallsOnly => "Network not allowed - emergency calls only",
            CmeError::Unknown => "Unknown error",
        }
    }
}

/// A failure reported by the device, tagged with the table its code belongs to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceErrorCode {
    /// `+CMS ERROR: <n>`
    Cms(u16),
    /// `+CME ERROR: <n>`
    Cme(u16),
    /// Bare `ERROR` with no code
    Unspecified,
}

impl DeviceErrorCode {
    pub fn code(&self) -> Option<u16> {
        match self {
            DeviceErrorCode::Cms(code) | DeviceErrorCode::Cme(code) => Some(*code),
            DeviceErrorCode::Unspecified => None,
        }
    }

    /// Human-readable description from the fixed code tables.
    pub fn description(&self) -> &'static str {
        match self {
            DeviceErrorCode::Cms(code) => CmsError::try_from(*code)
                .map(|e| e.description())
                .unwrap_or("Unknown error"),
            DeviceErrorCode::Cme(code) => CmeError::try_from(*code)
                .map(|e| e.description())
                .unwrap_or("Unknown error"),
            DeviceErrorCode::Unspecified => "Unknown error",
        }
    }
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
