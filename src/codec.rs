// AT command codec - separates the wire format from the session logic
//
// Commands go out as a single CR-terminated line. Replies come back as
// LF-terminated lines (usually wrapped in CR LF pairs), except the PDU input
// prompt which is a bare "> " with no line ending. Each decoded line is a
// `Frame`.

use bytes::{Buf, BufMut, BytesMut};
use std::fmt;
use std::io::Cursor;
use thiserror::Error;

/// Ends PDU input after `AT+CMGS`.
pub const CTRL_Z: u8 = 0x1A;

/// Cancels PDU input without sending.
pub const ESC: u8 = 0x1B;

/// Longest reply line accepted before the device is considered broken.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Codec errors with enough context to debug a misbehaving device
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Incomplete frame: need more data")]
    Incomplete,

    #[error("Reply line exceeds {MAX_LINE_LENGTH} bytes ({0} buffered)")]
    LineTooLong(usize),

    #[error("Malformed {kind} reply: {line:?}")]
    Malformed { kind: &'static str, line: String },
}

/// Commands issued to the modem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `AT` - liveness check
    Attention,
    /// `ATE0` - disable command echo
    EchoOff,
    /// `AT+CMEE=1` - numeric `+CME ERROR` codes
    NumericErrors,
    /// `AT+CMGF=0` - PDU message format
    PduMode,
    /// `AT+CGMM` - model identification
    Model,
    /// `AT+CSCA?` - read the service centre address
    ReadServiceCentre,
    /// `AT+CMGS=<n>` - start a submit; `n` is the TPDU length in octets
    SendMessage { tpdu_length: usize },
}

impl Command {
    /// Writes the command line including its CR terminator.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self.to_string().as_bytes());
        buf.put_u8(b'\r');
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Attention => f.write_str("AT"),
            Command::EchoOff => f.write_str("ATE0"),
            Command::NumericErrors => f.write_str("AT+CMEE=1"),
            Command::PduMode => f.write_str("AT+CMGF=0"),
            Command::Model => f.write_str("AT+CGMM"),
            Command::ReadServiceCentre => f.write_str("AT+CSCA?"),
            Command::SendMessage { tpdu_length } => write!(f, "AT+CMGS={tpdu_length}"),
        }
    }
}

/// Writes hex-encoded PDU input followed by Ctrl-Z.
pub fn encode_pdu_input(hex: &str, buf: &mut BytesMut) {
    buf.put_slice(hex.as_bytes());
    buf.put_u8(CTRL_Z);
}

/// One decoded reply from the modem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Final result `OK`
    Ok,
    /// Final result `ERROR`
    Error,
    /// Final result `+CME ERROR: <n>`
    CmeError(u16),
    /// Final result `+CMS ERROR: <n>`
    CmsError(u16),
    /// `> ` - the modem is waiting for PDU input
    Prompt,
    /// `+CSCA: "<number>",<type>`
    ServiceCentre { number: String, type_of_address: u8 },
    /// `+CMGS: <mr>` - the network accepted the message
    MessageReference(u8),
    /// A command echoed back while echo is still on
    Echo(String),
    /// Anything else: identification text, unsolicited result codes
    Information(String),
}

impl Frame {
    /// True for replies that end a command.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Frame::Ok | Frame::Error | Frame::CmeError(_) | Frame::CmsError(_)
        )
    }

    /// Checks if an entire frame can be decoded from `src`.
    ///
    /// On success the cursor is left just past the frame, so its position is
    /// the number of bytes the frame occupies (including any leading blank
    /// line breaks).
    pub fn check(src: &mut Cursor<&[u8]>) -> Result<(), CodecError> {
        skip_line_breaks(src);
        let start = src.position() as usize;
        let data = &src.get_ref()[start..];

        if data.starts_with(b"> ") {
            src.set_position((start + 2) as u64);
            return Ok(());
        }

        match data.iter().position(|&b| b == b'\n') {
            Some(end) if end > MAX_LINE_LENGTH => Err(CodecError::LineTooLong(end)),
            Some(end) => {
                src.set_position((start + end + 1) as u64);
                Ok(())
            }
            None if data.len() > MAX_LINE_LENGTH => Err(CodecError::LineTooLong(data.len())),
            None => Err(CodecError::Incomplete),
        }
    }

    /// Decodes the frame `check` has already validated.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, CodecError> {
        skip_line_breaks(src);
        let start = src.position() as usize;
        let data = &src.get_ref()[start..];

        if data.starts_with(b"> ") {
            src.advance(2);
            return Ok(Frame::Prompt);
        }

        let end = data
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(CodecError::Incomplete)?;
        let line = String::from_utf8_lossy(&data[..end]);
        src.advance(end + 1);

        Frame::from_line(line.trim())
    }

    fn from_line(line: &str) -> Result<Frame, CodecError> {
        if line == "OK" {
            return Ok(Frame::Ok);
        }
        if line == "ERROR" {
            return Ok(Frame::Error);
        }
        if let Some(rest) = line.strip_prefix("+CME ERROR:") {
            // Verbose (text) reports carry no usable number
            return Ok(Frame::CmeError(rest.trim().parse().unwrap_or(100)));
        }
        if let Some(rest) = line.strip_prefix("+CMS ERROR:") {
            return Ok(Frame::CmsError(rest.trim().parse().unwrap_or(500)));
        }
        if let Some(rest) = line.strip_prefix("+CSCA:") {
            return parse_service_centre(rest.trim(), line);
        }
        if let Some(rest) = line.strip_prefix("+CMGS:") {
            let reference = rest
                .split(',')
                .next()
                .and_then(|r| r.trim().parse::<u8>().ok())
                .ok_or_else(|| CodecError::Malformed {
                    kind: "+CMGS",
                    line: line.to_string(),
                })?;
            return Ok(Frame::MessageReference(reference));
        }
        if line
            .as_bytes()
            .get(..2)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"AT"))
        {
            return Ok(Frame::Echo(line.to_string()));
        }
        Ok(Frame::Information(line.to_string()))
    }
}

fn parse_service_centre(rest: &str, line: &str) -> Result<Frame, CodecError> {
    let malformed = || CodecError::Malformed {
        kind: "+CSCA",
        line: line.to_string(),
    };

    let (quoted, type_field) = rest.rsplit_once(',').unwrap_or((rest, "145"));
    let number = quoted
        .trim()
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(malformed)?;
    let type_of_address = type_field.trim().parse::<u8>().map_err(|_| malformed())?;

    Ok(Frame::ServiceCentre {
        number: number.to_string(),
        type_of_address,
    })
}

fn skip_line_breaks(src: &mut Cursor<&[u8]>) {
    while src.has_remaining() && matches!(src.chunk()[0], b'\r' | b'\n') {
        src.advance(1);
    }
}
