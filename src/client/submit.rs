// ABOUTME: Submission coordinator driving one submit-and-confirm cycle on a connected session
// ABOUTME: Arms the completion signal, hands the PDU to the modem and polls until a send status arrives

use crate::client::device::DeviceOpener;
use crate::client::error::{GsmError, GsmResult};
use crate::client::session::{SMSC_LOCATION, Session};
use crate::client::signal::SubmissionOutcome;
use crate::client::types::OutboundMessage;
use crate::codec::{Command, Frame};
use crate::connection::{Connection, ConnectionError};
use crate::pdu::{PduError, SmsSubmit};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, trace, warn};

fn pdu_error(err: PduError) -> GsmError {
    match err {
        PduError::UserDataTooLong { .. } => GsmError::TextTooLong,
        other => GsmError::InvalidData(other.to_string()),
    }
}

impl<O: DeviceOpener> Session<O> {
    /// Encodes `text` for `number` and submits it.
    ///
    /// Returns the message reference assigned by the network.
    pub async fn send_sms(&mut self, text: &str, number: &str) -> GsmResult<u8> {
        let message = OutboundMessage::encode(text, number)?;
        self.submit(message).await
    }

    /// Submits one message and waits for the device to confirm it.
    ///
    /// The SMSC is read from the device immediately before sending. The wait
    /// has no limit unless `SubmitOptions::max_polls` is set; each poll waits
    /// up to `poll_interval` for input from the device. Nothing else can use
    /// the session while this runs.
    pub async fn submit(&mut self, message: OutboundMessage) -> GsmResult<u8> {
        if !self.is_connected() {
            return Err(GsmError::NotConnected);
        }

        // Reject what cannot be encoded before touching the device
        SmsSubmit::from_message(&message).map_err(pdu_error)?;

        let smsc = self.get_smsc(SMSC_LOCATION).await?;
        let message = message.with_smsc(smsc);
        let pdu = SmsSubmit::from_message(&message).map_err(pdu_error)?.to_hex();

        let reply_timeout = self.reply_timeout();
        let options = self.options;
        let signal = self.signal.clone();
        let conn = self.connection_mut()?;

        let guard = signal.arm()?;
        conn.abandon_send_status();

        debug!(tpdu_length = pdu.tpdu_length, "submitting");
        let command = Command::SendMessage {
            tpdu_length: pdu.tpdu_length,
        };
        let frames = match conn.execute(&command, reply_timeout).await {
            Ok(frames) => frames,
            Err(e) => {
                let lost = e.is_disconnect();
                if matches!(e, ConnectionError::Timeout(_)) {
                    // The prompt may still come; make sure the modem stops waiting
                    if let Err(cancel) = conn.cancel_input().await {
                        debug!(error = %cancel, "cancelling PDU input");
                    }
                }
                if lost {
                    self.drop_connection();
                }
                return Err(GsmError::SubmissionRejected(e.to_string()));
            }
        };
        if frames.last() != Some(&Frame::Prompt) {
            return Err(GsmError::SubmissionRejected(
                "device did not prompt for PDU input".into(),
            ));
        }

        if let Err(e) = conn.write_pdu(&pdu.hex).await {
            self.drop_connection();
            return Err(GsmError::DeviceError(e.to_string()));
        }

        let mut polls: u32 = 0;
        let lost = loop {
            match guard.outcome() {
                SubmissionOutcome::Success { reference } => {
                    drain_final_result(conn, reply_timeout).await;
                    info!(reference, polls, "message sent");
                    return Ok(reference);
                }
                SubmissionOutcome::Failed(error) => {
                    warn!(code = ?error.code(), %error, "message rejected by device");
                    return Err(GsmError::DeviceError(error.description().to_string()));
                }
                SubmissionOutcome::Pending => {}
            }

            if options.max_polls.is_some_and(|max| polls >= max) {
                conn.abandon_send_status();
                warn!(polls, "no send status, giving up");
                return Err(GsmError::Unconfirmed { polls });
            }
            polls += 1;

            match tokio::time::timeout(options.poll_interval, conn.read_frame()).await {
                Err(_) => trace!(polls, "waiting for send status"),
                Ok(Ok(Some(frame))) => trace!(?frame, "frame while waiting for send status"),
                Ok(Ok(None)) => break ConnectionError::Closed,
                Ok(Err(e)) if e.is_disconnect() => break e,
                Ok(Err(e)) => {
                    conn.abandon_send_status();
                    return Err(GsmError::DeviceError(e.to_string()));
                }
            }
        };

        warn!(error = %lost, "device lost while waiting for send status");
        self.drop_connection();
        Err(GsmError::DeviceError(lost.to_string()))
    }
}

/// Consumes the `OK` that follows `+CMGS` so it is not mistaken for the
/// reply to the next command.
async fn drain_final_result<S>(conn: &mut Connection<S>, timeout: Duration)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let drained = tokio::time::timeout(timeout, async {
        loop {
            match conn.read_frame().await {
                Ok(Some(frame)) if frame.is_final() => return,
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => return,
            }
        }
    })
    .await;

    if drained.is_err() {
        debug!("no final result after send status");
    }
}
