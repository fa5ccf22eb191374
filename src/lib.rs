pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod datatypes;
pub mod logging;
pub mod pdu;
pub mod server;

#[cfg(test)]
mod testing;

// Re-export codec types for direct access
pub use codec::{CodecError, Command, Frame};

// Re-export the main client API for easy access
pub use client::{
    GsmError, GsmResult, OutboundMessage, SerialOpener, Session, SharedSession, SmsTransmitter,
    SubmitOptions,
};
pub use config::{ConfigLocator, DeviceConfig};
