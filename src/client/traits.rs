// ABOUTME: Transmitter trait used by outer surfaces to hand a message to the device layer
// ABOUTME: Implemented for a mutex-shared session so concurrent callers are serialized

use crate::client::device::{DeviceOpener, SerialOpener};
use crate::client::error::GsmResult;
use crate::client::session::Session;
use crate::client::types::OutboundMessage;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Anything that can submit an encoded message and report the outcome.
///
/// Returns the network message reference on success.
pub trait SmsTransmitter: Send + Sync + 'static {
    fn submit(&self, message: OutboundMessage) -> impl Future<Output = GsmResult<u8>> + Send;
}

/// A session shared between tasks. The lock is held for the whole
/// submit-and-confirm cycle, so at most one submission is in flight.
pub type SharedSession<O = SerialOpener> = Arc<Mutex<Session<O>>>;

impl<O: DeviceOpener> SmsTransmitter for SharedSession<O> {
    async fn submit(&self, message: OutboundMessage) -> GsmResult<u8> {
        let mut session = self.lock().await;
        session.submit(message).await
    }
}

/// Wraps a session for sharing.
pub fn share<O: DeviceOpener>(session: Session<O>) -> SharedSession<O> {
    Arc::new(Mutex::new(session))
}
