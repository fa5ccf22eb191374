//! Scripted modem and device opener for session tests

use crate::client::device::DeviceOpener;
use crate::codec::{CTRL_Z, ESC};
use crate::config::DeviceConfig;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf, duplex,
};

/// How the modem answers `AT+CMGS` and the PDU that follows
#[derive(Clone, Debug)]
pub enum SendReply {
    /// Prompt, then `+CMGS: <mr>` and `OK`
    Accept,
    /// Prompt, then wait before accepting
    AcceptAfter(Duration),
    /// Prompt, then `+CMS ERROR: <code>`
    Reject(u16),
    /// Prompt, then nothing at all
    Silent,
    /// `+CMS ERROR: <code>` instead of the prompt
    RefuseCommand(u16),
    /// Prompt, then close the line once the PDU is in
    HangUp,
}

/// Behaviour of one fake modem
#[derive(Clone, Debug)]
pub struct ModemScript {
    pub responsive: bool,
    pub pdu_mode: bool,
    pub model: String,
    pub smsc: Option<String>,
    pub first_reference: u8,
    /// Closing the stream reports an error
    pub fail_shutdown: bool,
    /// One entry per submission; `Accept` once exhausted
    pub send_replies: VecDeque<SendReply>,
}

impl Default for ModemScript {
    fn default() -> Self {
        ModemScript {
            responsive: true,
            pdu_mode: true,
            model: "E173".to_string(),
            smsc: Some("+447785016005".to_string()),
            first_reference: 1,
            fail_shutdown: false,
            send_replies: VecDeque::new(),
        }
    }
}

impl ModemScript {
    pub fn replies(mut self, replies: impl IntoIterator<Item = SendReply>) -> Self {
        self.send_replies = replies.into_iter().collect();
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModemEvent {
    Command(String),
    Pdu(String),
    Cancelled,
    /// The client side of the line was released
    Released,
}

/// Everything the modem received, in order
#[derive(Clone, Debug, Default)]
pub struct Transcript(Arc<Mutex<Vec<ModemEvent>>>);

impl Transcript {
    fn push(&self, event: ModemEvent) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<ModemEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ModemEvent::Command(command) => Some(command),
                _ => None,
            })
            .collect()
    }

    pub fn pdus(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ModemEvent::Pdu(pdu) => Some(pdu),
                _ => None,
            })
            .collect()
    }
}

/// Opens an in-memory stream to a freshly spawned fake modem
#[derive(Debug)]
pub struct MockOpener {
    script: ModemScript,
    transcript: Transcript,
    fail_open: bool,
}

impl MockOpener {
    pub fn new(script: ModemScript) -> (Self, Transcript) {
        let transcript = Transcript::default();
        let opener = MockOpener {
            script,
            transcript: transcript.clone(),
            fail_open: false,
        };
        (opener, transcript)
    }

    pub fn unavailable() -> Self {
        MockOpener {
            script: ModemScript::default(),
            transcript: Transcript::default(),
            fail_open: true,
        }
    }
}

/// Client end of the in-memory line
#[derive(Debug)]
pub struct ModemStream {
    inner: DuplexStream,
    fail_shutdown: bool,
}

impl AsyncRead for ModemStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for ModemStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.fail_shutdown {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "port vanished",
            )));
        }
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl DeviceOpener for MockOpener {
    type Stream = ModemStream;

    fn open(&self, config: &DeviceConfig) -> io::Result<ModemStream> {
        if self.fail_open {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such device {}", config.device),
            ));
        }

        let (client, modem) = duplex(4096);
        tokio::spawn(run_modem(
            modem,
            self.script.clone(),
            self.transcript.clone(),
        ));
        Ok(ModemStream {
            inner: client,
            fail_shutdown: self.script.fail_shutdown,
        })
    }
}

/// Test profile with short timeouts.
pub fn test_config() -> DeviceConfig {
    let mut config = DeviceConfig::new("/dev/ttyFAKE0");
    config.reply_timeout = 2;
    config
}

async fn run_modem(mut stream: DuplexStream, mut script: ModemScript, transcript: Transcript) {
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 512];
    let mut echo = true;
    let mut awaiting_pdu = false;
    let mut reference = script.first_reference;
    let mut current_reply = SendReply::Accept;

    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => {
                transcript.push(ModemEvent::Released);
                return;
            }
            Ok(n) => n,
        };
        pending.extend_from_slice(&chunk[..n]);

        loop {
            if awaiting_pdu {
                let Some(end) = pending.iter().position(|&b| b == CTRL_Z || b == ESC) else {
                    break;
                };
                let input: Vec<u8> = pending.drain(..=end).collect();
                awaiting_pdu = false;

                if input[end] == ESC {
                    transcript.push(ModemEvent::Cancelled);
                    continue;
                }
                transcript.push(ModemEvent::Pdu(
                    String::from_utf8_lossy(&input[..end]).into_owned(),
                ));

                let reply = match &current_reply {
                    SendReply::Accept => Some(accepted(&mut reference)),
                    SendReply::AcceptAfter(delay) => {
                        tokio::time::sleep(*delay).await;
                        Some(accepted(&mut reference))
                    }
                    SendReply::Reject(code) => Some(format!("\r\n+CMS ERROR: {code}\r\n")),
                    SendReply::HangUp => return,
                    SendReply::Silent | SendReply::RefuseCommand(_) => None,
                };
                if let Some(reply) = reply {
                    if stream.write_all(reply.as_bytes()).await.is_err() {
                        return;
                    }
                }
                continue;
            }

            let Some(end) = pending.iter().position(|&b| b == b'\r') else {
                break;
            };
            let line: Vec<u8> = pending.drain(..=end).collect();
            let command = String::from_utf8_lossy(&line[..end])
                .trim_matches(|c: char| c == '\u{1b}' || c.is_whitespace())
                .to_string();
            if command.is_empty() {
                continue;
            }
            transcript.push(ModemEvent::Command(command.clone()));

            let mut reply = String::new();
            if echo {
                reply.push_str(&command);
                reply.push('\r');
            }

            match command.as_str() {
                "AT" if !script.responsive => continue,
                "AT" | "AT+CMEE=1" => reply.push_str("\r\nOK\r\n"),
                "ATE0" => {
                    echo = false;
                    reply.push_str("\r\nOK\r\n");
                }
                "AT+CMGF=0" if script.pdu_mode => reply.push_str("\r\nOK\r\n"),
                "AT+CGMM" => reply.push_str(&format!("\r\n{}\r\n\r\nOK\r\n", script.model)),
                "AT+CSCA?" => match &script.smsc {
                    Some(smsc) => {
                        reply.push_str(&format!("\r\n+CSCA: \"{smsc}\",145\r\n\r\nOK\r\n"))
                    }
                    None => reply.push_str("\r\n+CSCA: \"\",129\r\n\r\nOK\r\n"),
                },
                command if command.starts_with("AT+CMGS=") => {
                    current_reply = script.send_replies.pop_front().unwrap_or(SendReply::Accept);
                    match current_reply {
                        SendReply::RefuseCommand(code) => {
                            reply.push_str(&format!("\r\n+CMS ERROR: {code}\r\n"));
                        }
                        _ => {
                            reply.push_str("\r\n> ");
                            awaiting_pdu = true;
                        }
                    }
                }
                _ => reply.push_str("\r\nERROR\r\n"),
            }

            if stream.write_all(reply.as_bytes()).await.is_err() {
                return;
            }
        }
    }
}

fn accepted(reference: &mut u8) -> String {
    let reply = format!("\r\n+CMGS: {reference}\r\n\r\nOK\r\n");
    *reference = reference.wrapping_add(1);
    reply
}
