// ABOUTME: Buffered AT command I/O over a serial (or any async byte) stream to a GSM modem
// ABOUTME: Reads reply frames, runs command/response exchanges and dispatches send-status notifications

use crate::client::signal::{SendStatus, SendStatusHandler};
use crate::codec::{self, CodecError, Command, Frame};
use crate::datatypes::DeviceErrorCode;
use bytes::BytesMut;
use std::io::{self, Cursor};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, trace};

/// Default capacity of the read buffer.
pub const READ_BUFFER_CAPACITY: usize = 4 * 1024;

/// Transport-level failures
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Codec(#[from] CodecError),

    #[error("Device closed the connection")]
    Closed,

    #[error("No reply from device within {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Device(DeviceErrorCode),
}

impl ConnectionError {
    /// The stream is unusable after this error.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ConnectionError::Io(_) | ConnectionError::Closed)
    }
}

/// AT command connection to a modem.
///
/// Handles line framing only. The caller drives the handshake and the
/// submission sequence; the connection's one piece of protocol knowledge is
/// that the first final reply after PDU input is the send status, which it
/// hands to the registered `SendStatusHandler`.
#[derive(Debug)]
pub struct Connection<S> {
    // Commands are short, but PDU input is written in one go, so buffer
    // writes and flush once per command.
    stream: BufWriter<S>,

    // Bytes read from the device and not yet parsed into frames.
    buffer: Vec<u8>,

    debug: bool,

    send_status: Option<SendStatusHandler>,

    // Set after PDU input is written, cleared once the status arrives.
    awaiting_send_status: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Connection<S> {
        Connection::with_buffer(stream, Vec::with_capacity(READ_BUFFER_CAPACITY))
    }

    /// Creates a connection around a read buffer the caller already reserved.
    pub fn with_buffer(stream: S, mut buffer: Vec<u8>) -> Connection<S> {
        buffer.clear();
        Connection {
            stream: BufWriter::new(stream),
            buffer,
            debug: false,
            send_status: None,
            awaiting_send_status: false,
        }
    }

    /// Turns raw traffic tracing on or off.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Registers the handler invoked when a send status arrives.
    pub fn register_send_status_handler(&mut self, handler: SendStatusHandler) {
        self.send_status = Some(handler);
    }

    pub fn is_awaiting_send_status(&self) -> bool {
        self.awaiting_send_status
    }

    /// Reads a single frame from the device.
    ///
    /// Waits until enough data is buffered to parse a frame; leftover bytes
    /// stay buffered for the next call. Returns `None` when the device closed
    /// the stream cleanly. Cancel safe: a dropped future loses no data.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                if self.debug {
                    trace!(?frame, "<- frame");
                }
                self.dispatch_send_status(&frame);
                return Ok(Some(frame));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                return if self.buffer.iter().all(|b| matches!(b, b'\r' | b'\n')) {
                    Ok(None)
                } else {
                    Err(ConnectionError::Closed)
                };
            }

            if self.debug {
                trace!(raw = %String::from_utf8_lossy(&self.buffer).escape_debug(), "<- buffered");
            }
        }
    }

    fn parse_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        let mut buf = Cursor::new(&self.buffer[..]);

        match Frame::check(&mut buf) {
            Ok(()) => {
                let len = buf.position() as usize;
                buf.set_position(0);

                // Consumed even when malformed, so the next line can be read
                let frame = Frame::parse(&mut buf);
                self.buffer.drain(..len);

                Ok(Some(frame?))
            }
            // Not an error: wait for more bytes
            Err(CodecError::Incomplete) => Ok(None),
            Err(e @ CodecError::LineTooLong(_)) => {
                self.skip_line();
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drops the line at the front of the buffer so reading resumes at the
    /// next one. Without a line break yet, everything buffered goes.
    fn skip_line(&mut self) {
        let start = self
            .buffer
            .iter()
            .position(|b| !matches!(b, b'\r' | b'\n'))
            .unwrap_or(self.buffer.len());

        match self.buffer[start..].iter().position(|&b| b == b'\n') {
            Some(end) => {
                self.buffer.drain(..start + end + 1);
            }
            None => self.buffer.clear(),
        }
        debug!(remaining = self.buffer.len(), "skipped overlong line");
    }

    fn dispatch_send_status(&mut self, frame: &Frame) {
        if !self.awaiting_send_status {
            return;
        }

        let status = match frame {
            Frame::MessageReference(reference) => SendStatus::Accepted {
                reference: *reference,
            },
            Frame::CmsError(code) => SendStatus::Rejected(DeviceErrorCode::Cms(*code)),
            Frame::CmeError(code) => SendStatus::Rejected(DeviceErrorCode::Cme(*code)),
            Frame::Error => SendStatus::Rejected(DeviceErrorCode::Unspecified),
            _ => return,
        };

        self.awaiting_send_status = false;
        match &self.send_status {
            Some(handler) => handler.on_send_status(status),
            None => debug!(?status, "send status with no handler registered"),
        }
    }

    /// Writes a command line and flushes it.
    pub async fn write_command(&mut self, command: &Command) -> io::Result<()> {
        debug!(%command, "-> command");

        let mut buf = BytesMut::with_capacity(32);
        command.encode(&mut buf);
        self.stream.write_all(&buf).await?;
        self.stream.flush().await
    }

    /// Writes hex PDU input terminated by Ctrl-Z. The next final reply is
    /// treated as the send status.
    pub async fn write_pdu(&mut self, hex: &str) -> io::Result<()> {
        if self.debug {
            trace!(pdu = hex, "-> pdu");
        }

        let mut buf = BytesMut::with_capacity(hex.len() + 1);
        codec::encode_pdu_input(hex, &mut buf);
        self.stream.write_all(&buf).await?;
        self.stream.flush().await?;

        self.awaiting_send_status = true;
        Ok(())
    }

    /// Stops treating the next final reply as a send status. A status that
    /// arrives later is then just another frame.
    pub fn abandon_send_status(&mut self) {
        self.awaiting_send_status = false;
    }

    /// Aborts PDU input after a prompt that will not be answered.
    pub async fn cancel_input(&mut self) -> io::Result<()> {
        debug!("-> cancel pdu input");
        self.stream.write_all(&[codec::ESC]).await?;
        self.stream.flush().await
    }

    /// Runs one command and collects its reply.
    ///
    /// Returns the intermediate frames (echo excluded). The exchange ends at
    /// `OK` or at the PDU prompt, which is included as the last frame. An
    /// error result becomes `ConnectionError::Device`.
    pub async fn execute(
        &mut self,
        command: &Command,
        timeout: Duration,
    ) -> Result<Vec<Frame>, ConnectionError> {
        self.discard_stale_input().await?;
        self.write_command(command).await?;

        tokio::time::timeout(timeout, self.collect_reply())
            .await
            .map_err(|_| ConnectionError::Timeout(timeout))?
    }

    /// Drops complete frames that arrived before a command was sent, such as
    /// the late reply to an abandoned submission.
    async fn discard_stale_input(&mut self) -> Result<(), ConnectionError> {
        // A zero timeout still polls the read once, so only ready data is taken
        while let Ok(read) =
            tokio::time::timeout(Duration::ZERO, self.stream.read_buf(&mut self.buffer)).await
        {
            if read? == 0 {
                break;
            }
        }

        while let Some(frame) = self.parse_frame()? {
            debug!(?frame, "discarding stale frame");
        }
        Ok(())
    }

    async fn collect_reply(&mut self) -> Result<Vec<Frame>, ConnectionError> {
        let mut frames = Vec::new();
        loop {
            let frame = self.read_frame().await?.ok_or(ConnectionError::Closed)?;
            match frame {
                Frame::Ok => return Ok(frames),
                Frame::Prompt => {
                    frames.push(frame);
                    return Ok(frames);
                }
                Frame::Error => return Err(ConnectionError::Device(DeviceErrorCode::Unspecified)),
                Frame::CmeError(code) => {
                    return Err(ConnectionError::Device(DeviceErrorCode::Cme(code)));
                }
                Frame::CmsError(code) => {
                    return Err(ConnectionError::Device(DeviceErrorCode::Cms(code)));
                }
                Frame::Echo(_) => {}
                other => frames.push(other),
            }
        }
    }

    /// Flushes pending output and shuts the stream down.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.flush().await?;
        self.stream.shutdown().await
    }

    /// Releases the stream and hands back the read buffer for reuse.
    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::signal::{CompletionSignal, SubmissionOutcome};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

    #[tokio::test]
    async fn reads_frames_across_partial_writes() {
        let (client, mut modem) = duplex(256);
        let mut conn = Connection::new(client);

        modem.write_all(b"\r\nO").await.unwrap();
        let read = tokio::spawn(async move {
            let frame = conn.read_frame().await.unwrap();
            (conn, frame)
        });
        modem.write_all(b"K\r\n").await.unwrap();

        let (_, frame) = read.await.unwrap();
        assert_eq!(frame, Some(Frame::Ok));
    }

    #[tokio::test]
    async fn clean_close_yields_none() {
        let (client, mut modem) = duplex(64);
        let mut conn = Connection::new(client);

        modem.write_all(b"OK\r\n\r\n").await.unwrap();
        drop(modem);

        assert_eq!(conn.read_frame().await.unwrap(), Some(Frame::Ok));
        assert_eq!(conn.read_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reading_resumes_after_overlong_line() {
        let (client, mut modem) = duplex(4096);
        let mut conn = Connection::new(client);

        let mut noise = vec![b'x'; codec::MAX_LINE_LENGTH + 76];
        noise.extend_from_slice(b"\r\nOK\r\n");
        modem.write_all(&noise).await.unwrap();

        assert!(matches!(
            conn.read_frame().await,
            Err(ConnectionError::Codec(CodecError::LineTooLong(_)))
        ));
        assert_eq!(conn.read_frame().await.unwrap(), Some(Frame::Ok));
    }

    #[tokio::test]
    async fn malformed_line_is_consumed() {
        let (client, mut modem) = duplex(64);
        let mut conn = Connection::new(client);

        modem.write_all(b"\r\n+CMGS: x\r\n\r\nOK\r\n").await.unwrap();

        assert!(matches!(
            conn.read_frame().await,
            Err(ConnectionError::Codec(CodecError::Malformed { kind: "+CMGS", .. }))
        ));
        assert_eq!(conn.read_frame().await.unwrap(), Some(Frame::Ok));
    }

    #[tokio::test]
    async fn close_mid_line_is_an_error() {
        let (client, mut modem) = duplex(64);
        let mut conn = Connection::new(client);

        modem.write_all(b"+CSCA: \"+44").await.unwrap();
        drop(modem);

        assert!(matches!(
            conn.read_frame().await,
            Err(ConnectionError::Closed)
        ));
    }

    /// Waits for the next command line, then writes `reply`.
    async fn answer(modem: &mut DuplexStream, reply: &[u8]) -> String {
        let mut line = Vec::new();
        loop {
            match modem.read_u8().await.unwrap() {
                b'\r' => break,
                b => line.push(b),
            }
        }
        modem.write_all(reply).await.unwrap();
        String::from_utf8(line).unwrap()
    }

    #[tokio::test]
    async fn execute_collects_until_ok() {
        let (client, mut modem) = duplex(256);
        let mut conn = Connection::new(client);

        let (frames, command) = tokio::join!(
            conn.execute(&Command::ReadServiceCentre, Duration::from_secs(1)),
            answer(
                &mut modem,
                b"AT+CSCA?\r\r\n+CSCA: \"+447785016005\",145\r\n\r\nOK\r\n"
            )
        );

        assert_eq!(command, "AT+CSCA?");
        assert_eq!(
            frames.unwrap(),
            vec![Frame::ServiceCentre {
                number: "+447785016005".to_string(),
                type_of_address: 145
            }]
        );
    }

    #[tokio::test]
    async fn execute_maps_error_results() {
        let (client, mut modem) = duplex(256);
        let mut conn = Connection::new(client);

        let (result, _) = tokio::join!(
            conn.execute(&Command::PduMode, Duration::from_secs(1)),
            answer(&mut modem, b"\r\n+CME ERROR: 10\r\n")
        );

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::Device(DeviceErrorCode::Cme(10))
        ));
        assert_eq!(err.to_string(), "SIM not inserted");
    }

    #[tokio::test(start_paused = true)]
    async fn execute_times_out_on_silence() {
        let (client, _modem) = duplex(256);
        let mut conn = Connection::new(client);

        let err = conn
            .execute(&Command::Attention, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Timeout(_)));
    }

    #[tokio::test]
    async fn execute_stops_at_prompt() {
        let (client, mut modem) = duplex(256);
        let mut conn = Connection::new(client);

        let (frames, command) = tokio::join!(
            conn.execute(&Command::SendMessage { tpdu_length: 19 }, Duration::from_secs(1)),
            answer(&mut modem, b"\r\n> ")
        );
        assert_eq!(command, "AT+CMGS=19");
        assert_eq!(frames.unwrap(), vec![Frame::Prompt]);
    }

    #[tokio::test]
    async fn send_status_is_dispatched_after_pdu_input() {
        let (client, mut modem) = duplex(256);
        let mut conn = Connection::new(client);
        let signal = CompletionSignal::new();
        conn.register_send_status_handler(signal.handler());
        let guard = signal.arm().unwrap();

        conn.write_pdu("0011").await.unwrap();
        assert!(conn.is_awaiting_send_status());

        modem.write_all(b"\r\n+CMGS: 17\r\n\r\nOK\r\n").await.unwrap();
        conn.read_frame().await.unwrap();

        assert!(!conn.is_awaiting_send_status());
        assert_eq!(guard.outcome(), SubmissionOutcome::Success { reference: 17 });

        // The trailing OK is not a second status
        assert_eq!(conn.read_frame().await.unwrap(), Some(Frame::Ok));
        assert_eq!(guard.outcome(), SubmissionOutcome::Success { reference: 17 });
    }

    #[tokio::test]
    async fn execute_discards_stale_frames() {
        let (client, mut modem) = duplex(256);
        let mut conn = Connection::new(client);

        // Late reply to a submission that was already given up on
        modem.write_all(b"\r\n+CMGS: 3\r\n\r\nOK\r\n").await.unwrap();

        let (frames, _) = tokio::join!(
            conn.execute(&Command::ReadServiceCentre, Duration::from_secs(1)),
            answer(
                &mut modem,
                b"\r\n+CSCA: \"+447785016005\",145\r\n\r\nOK\r\n"
            )
        );

        assert_eq!(
            frames.unwrap(),
            vec![Frame::ServiceCentre {
                number: "+447785016005".to_string(),
                type_of_address: 145
            }]
        );
    }

    #[tokio::test]
    async fn replies_outside_submission_are_not_dispatched() {
        let (client, mut modem) = duplex(256);
        let mut conn = Connection::new(client);
        let signal = CompletionSignal::new();
        conn.register_send_status_handler(signal.handler());
        let guard = signal.arm().unwrap();

        modem.write_all(b"\r\n+CMS ERROR: 38\r\n").await.unwrap();
        conn.read_frame().await.unwrap();

        assert_eq!(guard.outcome(), SubmissionOutcome::Pending);
    }
}
