// ABOUTME: Outbound message, session state and submission options for the GSM client
// ABOUTME: Encodes caller text and number into the native 16-bit representation with fixed submit fields

use crate::client::error::{GsmError, GsmResult};
use crate::datatypes::{DataCoding, MessageClass, UnicodeText};
use std::fmt;
use std::time::Duration;

/// Longest text accepted for a single message, in characters.
pub const MAX_TEXT_CHARS: usize = 160;

/// Kind of TPDU to build. Only submit is ever sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PduType {
    #[default]
    Submit,
}

/// User data header presence. Single messages never carry one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UserDataHeader {
    #[default]
    None,
}

/// A text message ready for submission
///
/// Text and number are held in the device's native UTF-16 representation.
/// The protocol fields are fixed: submit, no UDH, default alphabet, class 1.
/// `smsc` is filled in by the session right before sending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: UnicodeText,
    pub number: UnicodeText,
    pub pdu_type: PduType,
    pub udh: UserDataHeader,
    pub coding: DataCoding,
    pub class: MessageClass,
    pub smsc: Option<String>,
}

impl OutboundMessage {
    /// Encodes `text` for `number`.
    ///
    /// Text over 160 characters is rejected before anything is encoded. The
    /// number only has to be present; its format is checked when the PDU is
    /// built.
    pub fn encode(text: &str, number: &str) -> GsmResult<Self> {
        if text.chars().count() > MAX_TEXT_CHARS {
            return Err(GsmError::TextTooLong);
        }
        if number.trim().is_empty() {
            return Err(GsmError::InvalidData("destination number is empty".into()));
        }

        Ok(OutboundMessage {
            text: UnicodeText::encode(text),
            number: UnicodeText::encode(number.trim()),
            pdu_type: PduType::Submit,
            udh: UserDataHeader::None,
            coding: DataCoding::DefaultNoCompression,
            class: MessageClass::Class1,
            smsc: None,
        })
    }

    pub fn with_smsc(mut self, smsc: impl Into<String>) -> Self {
        self.smsc = Some(smsc.into());
        self
    }

    pub fn text(&self) -> String {
        self.text.decode()
    }

    pub fn number(&self) -> String {
        self.number.decode()
    }
}

/// Lifecycle of a device session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Poll loop tuning for one submission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Longest wait for device input per poll iteration
    pub poll_interval: Duration,
    /// Give up after this many silent polls. `None` polls until the device answers.
    pub max_polls: Option<u32>,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        SubmitOptions {
            poll_interval: Duration::from_secs(1),
            max_polls: None,
        }
    }
}

impl SubmitOptions {
    /// Bounds the wait to roughly `timeout`, rounded up to whole polls.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let interval = self.poll_interval.as_millis().max(1);
        let polls = timeout.as_millis().div_ceil(interval).max(1);
        self.max_polls = Some(u32::try_from(polls).unwrap_or(u32::MAX));
        self
    }
}
