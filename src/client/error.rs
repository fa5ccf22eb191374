// ABOUTME: Error taxonomy for GSM session, encoding and submission operations
// ABOUTME: Device failures carry the human-readable description from the fixed code tables

use crate::client::types::MAX_TEXT_CHARS;
use crate::connection::ConnectionError;
use thiserror::Error;

/// Errors surfaced to callers of the session and submission API
///
/// Every device or driver failure is reduced to a readable reason string
/// before it reaches this type. Nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum GsmError {
    /// The session's buffers could not be reserved
    #[error("Failed to allocate state machine")]
    AllocationFailed,

    /// No configuration file at the explicit path or any candidate location
    #[error("Configuration not found: {0}")]
    ConfigNotFound(String),

    #[error("Failed to parse configuration {path}: {reason}")]
    ConfigParse { path: String, reason: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Failed to read SMSC number: {0}")]
    SmscLookupFailed(String),

    #[error("Message exceeds {} characters", MAX_TEXT_CHARS)]
    TextTooLong,

    /// The device refused the submit command before taking PDU input
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    /// The device reported a failure for a submitted message
    #[error("{0}")]
    DeviceError(String),

    #[error("Termination failed: {0}")]
    TerminationFailed(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Phone is not connected")]
    NotConnected,

    /// Another submission on the same session has not finished
    #[error("A submission is already in flight on this session")]
    SubmissionInFlight,

    /// The poll cap was reached with no send status from the device
    #[error("No send status after {polls} polls")]
    Unconfirmed { polls: u32 },
}

/// Result type alias for GSM operations
pub type GsmResult<T> = Result<T, GsmError>;

impl GsmError {
    /// Wraps a transport failure seen while connecting.
    pub(crate) fn connection(err: ConnectionError) -> Self {
        GsmError::ConnectionFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_too_long_message() {
        assert_eq!(
            GsmError::TextTooLong.to_string(),
            "Message exceeds 160 characters"
        );
    }

    #[test]
    fn device_error_is_the_bare_reason() {
        assert_eq!(
            GsmError::DeviceError("Network out of order".into()).to_string(),
            "Network out of order"
        );
    }
}
