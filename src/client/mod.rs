// ABOUTME: GSM client module: device session, message encoding, submission and completion signalling
// ABOUTME: Exports the session API, the transmitter trait and the supporting types

//! GSM Client Module
//!
//! Sends single text messages through a modem attached over a serial line.
//!
//! * **Session** - owns the device connection and its configuration
//! * **OutboundMessage** - caller text and number in the device's native representation
//! * **Submission** - submit, then poll until the device reports a send status
//! * **CompletionSignal** - per-session single-slot outcome written by the status handler
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gsm_sender::client::{SerialOpener, Session};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::allocate(SerialOpener)?;
//! session.load_config(Path::new("/etc/gsm-sender.conf"))?;
//! session.connect().await?;
//!
//! let reference = session.send_sms("Hello!", "+15551234567").await?;
//! println!("sent, reference {reference}");
//!
//! session.terminate().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Sharing a Session
//!
//! Outer surfaces such as the HTTP server take a [`SmsTransmitter`]. A
//! [`SharedSession`] implements it by holding the session lock for the whole
//! submit-and-confirm cycle:
//!
//! ```rust,no_run
//! use gsm_sender::client::{OutboundMessage, SerialOpener, Session, SmsTransmitter, share};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = share(Session::allocate(SerialOpener)?);
//! let message = OutboundMessage::encode("Hello!", "+15551234567")?;
//! session.submit(message).await?;
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod error;
pub mod session;
pub mod signal;
pub mod submit;
pub mod traits;
pub mod types;

pub use device::{DeviceOpener, SerialOpener};
pub use error::{GsmError, GsmResult};
pub use session::{HANDSHAKE_ATTEMPTS, SMSC_LOCATION, Session};
pub use signal::{
    CompletionSignal, SendStatus, SendStatusHandler, SubmissionGuard, SubmissionOutcome,
};
pub use traits::{SharedSession, SmsTransmitter, share};
pub use types::{
    MAX_TEXT_CHARS, OutboundMessage, PduType, SessionState, SubmitOptions, UserDataHeader,
};
