// ABOUTME: Device session owning the modem connection, its configuration and the completion signal
// ABOUTME: Implements allocate, configuration loading, the connect handshake, SMSC lookup and termination

use crate::client::device::{DeviceOpener, SerialOpener};
use crate::client::error::{GsmError, GsmResult};
use crate::client::signal::CompletionSignal;
use crate::client::types::{SessionState, SubmitOptions};
use crate::codec::{Command, Frame};
use crate::config::DeviceConfig;
use crate::connection::{Connection, ConnectionError, READ_BUFFER_CAPACITY};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// How many times `AT` is sent before the device is declared silent.
pub const HANDSHAKE_ATTEMPTS: u32 = 3;

/// SMSC memory location read before every submission.
pub const SMSC_LOCATION: u8 = 1;

/// A session with one GSM modem.
///
/// Created by [`Session::allocate`], configured once, then moved through
/// `connect` and `terminate`. Lifecycle calls take `&mut self`, so they are
/// serialized by whoever owns the session; share it between tasks through
/// [`SharedSession`](crate::client::SharedSession).
pub struct Session<O: DeviceOpener = SerialOpener> {
    pub(super) opener: O,
    pub(super) config: Option<DeviceConfig>,
    pub(super) debug: bool,
    pub(super) state: SessionState,
    pub(super) connection: Option<Connection<O::Stream>>,
    // Reserved by `allocate`; lent to the connection while it is open
    pub(super) read_buffer: Option<Vec<u8>>,
    pub(super) signal: CompletionSignal,
    pub(super) options: SubmitOptions,
    pub(super) model: Option<String>,
}

impl<O: DeviceOpener> Session<O> {
    /// Reserves the session's resources.
    pub fn allocate(opener: O) -> GsmResult<Self> {
        let mut read_buffer = Vec::new();
        read_buffer
            .try_reserve_exact(READ_BUFFER_CAPACITY)
            .map_err(|_| GsmError::AllocationFailed)?;

        Ok(Session {
            opener,
            config: None,
            debug: false,
            state: SessionState::Disconnected,
            connection: None,
            read_buffer: Some(read_buffer),
            signal: CompletionSignal::new(),
            options: SubmitOptions::default(),
            model: None,
        })
    }

    /// Traces all device traffic. The subscriber decides where it goes; the
    /// binaries send it to stderr at TRACE level.
    pub fn enable_debug(&mut self) {
        self.debug = true;
        if let Some(conn) = self.connection.as_mut() {
            conn.set_debug(true);
        }
        debug!("device traffic tracing enabled");
    }

    /// Loads the single configuration profile from `path`.
    pub fn load_config(&mut self, path: &Path) -> GsmResult<()> {
        self.ensure_unconfigured()?;
        let config = DeviceConfig::from_file(path)?;
        self.apply_config(config);
        Ok(())
    }

    /// Uses an already parsed profile.
    pub fn set_config(&mut self, config: DeviceConfig) -> GsmResult<()> {
        self.ensure_unconfigured()?;
        self.apply_config(config);
        Ok(())
    }

    fn ensure_unconfigured(&self) -> GsmResult<()> {
        if self.state == SessionState::Terminated {
            return Err(GsmError::InvalidState("session is terminated".into()));
        }
        if self.config.is_some() {
            return Err(GsmError::InvalidState("configuration already loaded".into()));
        }
        Ok(())
    }

    fn apply_config(&mut self, config: DeviceConfig) {
        self.options = config.submit_options();
        self.config = Some(config);
    }

    pub fn config(&self) -> Option<&DeviceConfig> {
        self.config.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Model reported by the device during connect, if it answered.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn completion_signal(&self) -> &CompletionSignal {
        &self.signal
    }

    pub fn submit_options(&self) -> SubmitOptions {
        self.options
    }

    pub fn set_submit_options(&mut self, options: SubmitOptions) {
        self.options = options;
    }

    pub(super) fn reply_timeout(&self) -> Duration {
        self.config
            .as_ref()
            .map(DeviceConfig::reply_timeout)
            .unwrap_or(Duration::from_secs(5))
    }

    /// Opens the device and runs the handshake.
    ///
    /// Returns once the device has answered at least once and is in PDU mode.
    /// The send-status handler is registered on the connection before the
    /// handshake starts and stays registered until the connection closes. On
    /// failure the session is left disconnected and may be connected again.
    pub async fn connect(&mut self) -> GsmResult<()> {
        match self.state {
            SessionState::Disconnected => {}
            SessionState::Terminated => {
                return Err(GsmError::InvalidState("session is terminated".into()));
            }
            state => return Err(GsmError::InvalidState(format!("session is {state}"))),
        }
        let config = self
            .config
            .clone()
            .ok_or_else(|| GsmError::InvalidState("no configuration loaded".into()))?;

        info!(device = %config.device, baud_rate = config.baud_rate(), "connecting");

        let stream = self
            .opener
            .open(&config)
            .map_err(|e| GsmError::ConnectionFailed(format!("{}: {e}", config.device)))?;

        let buffer = self
            .read_buffer
            .take()
            .unwrap_or_else(|| Vec::with_capacity(READ_BUFFER_CAPACITY));
        let mut conn = Connection::with_buffer(stream, buffer);
        conn.set_debug(self.debug);
        conn.register_send_status_handler(self.signal.handler());

        let connecting = ConnectingState::enter(&mut self.state);
        match handshake(&mut conn, &config).await {
            Ok(model) => {
                info!(
                    model = model.as_deref().unwrap_or("unknown"),
                    hint = config.model_hint().unwrap_or("none"),
                    "connected"
                );
                self.model = model;
                self.connection = Some(conn);
                connecting.complete();
                Ok(())
            }
            Err(e) => {
                drop(connecting);
                warn!(error = %e, "handshake failed");
                if let Err(close) = conn.shutdown().await {
                    debug!(error = %close, "closing device after failed handshake");
                }
                self.read_buffer = Some(conn.into_buffer());
                Err(e)
            }
        }
    }

    /// Non-blocking liveness check.
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected && self.connection.is_some()
    }

    pub(super) fn connection_mut(&mut self) -> GsmResult<&mut Connection<O::Stream>> {
        if self.state != SessionState::Connected {
            return Err(GsmError::NotConnected);
        }
        self.connection.as_mut().ok_or(GsmError::NotConnected)
    }

    /// Forgets a connection whose device went away. The session may be
    /// connected again afterwards.
    pub(super) fn drop_connection(&mut self) {
        if let Some(conn) = self.connection.take() {
            self.read_buffer = Some(conn.into_buffer());
        }
        self.state = SessionState::Disconnected;
        warn!("device connection lost");
    }

    /// Reads the SMSC number stored at `location`.
    pub async fn get_smsc(&mut self, location: u8) -> GsmResult<String> {
        if location != SMSC_LOCATION {
            return Err(GsmError::SmscLookupFailed(format!(
                "location {location} is not supported"
            )));
        }

        let timeout = self.reply_timeout();
        let conn = self.connection_mut()?;
        let frames = match conn.execute(&Command::ReadServiceCentre, timeout).await {
            Ok(frames) => frames,
            Err(e) => {
                if e.is_disconnect() {
                    self.drop_connection();
                }
                return Err(GsmError::SmscLookupFailed(e.to_string()));
            }
        };

        let (number, type_of_address) = frames
            .into_iter()
            .find_map(|frame| match frame {
                Frame::ServiceCentre {
                    number,
                    type_of_address,
                } => Some((number, type_of_address)),
                _ => None,
            })
            .ok_or_else(|| GsmError::SmscLookupFailed("no +CSCA reply".into()))?;

        if number.is_empty() {
            return Err(GsmError::SmscLookupFailed("no SMSC number stored".into()));
        }

        // 145 is the international type-of-address
        let number = if type_of_address == 145 && !number.starts_with('+') {
            format!("+{number}")
        } else {
            number
        };
        debug!(smsc = %number, "service centre");
        Ok(number)
    }

    /// Closes the connection and releases the device.
    ///
    /// The device handle is dropped on every path, including when the close
    /// itself fails; that failure is still reported. Terminating twice is a
    /// no-op.
    pub async fn terminate(&mut self) -> GsmResult<()> {
        let connection = self.connection.take();
        self.state = SessionState::Terminated;

        let Some(mut conn) = connection else {
            return Ok(());
        };

        let result = conn.shutdown().await;
        self.read_buffer = Some(conn.into_buffer());
        info!("connection terminated");

        result.map_err(|e| GsmError::TerminationFailed(e.to_string()))
    }
}

/// Holds the session in `Connecting` for the handshake. Unless completed,
/// it falls back to `Disconnected` when dropped, including when the connect
/// future itself is dropped mid-handshake.
struct ConnectingState<'a> {
    state: &'a mut SessionState,
}

impl<'a> ConnectingState<'a> {
    fn enter(state: &'a mut SessionState) -> Self {
        *state = SessionState::Connecting;
        ConnectingState { state }
    }

    fn complete(self) {
        *self.state = SessionState::Connected;
    }
}

impl Drop for ConnectingState<'_> {
    fn drop(&mut self) {
        if *self.state == SessionState::Connecting {
            *self.state = SessionState::Disconnected;
        }
    }
}

async fn handshake<S>(conn: &mut Connection<S>, config: &DeviceConfig) -> GsmResult<Option<String>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let timeout = config.reply_timeout();

    let mut answered = false;
    for attempt in 1..=HANDSHAKE_ATTEMPTS {
        match conn.execute(&Command::Attention, timeout).await {
            Ok(_) => {
                answered = true;
                break;
            }
            Err(ConnectionError::Device(error)) => {
                warn!(attempt, %error, "device answered AT with an error");
                answered = true;
                break;
            }
            Err(ConnectionError::Timeout(_)) => {
                debug!(attempt, "no reply to AT");
            }
            Err(e) => return Err(GsmError::connection(e)),
        }
    }
    if !answered {
        return Err(GsmError::ConnectionFailed(format!(
            "no reply from {} after {HANDSHAKE_ATTEMPTS} attempts",
            config.device
        )));
    }

    conn.execute(&Command::EchoOff, timeout)
        .await
        .map_err(GsmError::connection)?;

    if let Err(e) = conn.execute(&Command::NumericErrors, timeout).await {
        warn!(error = %e, "numeric error reports not available");
    }

    conn.execute(&Command::PduMode, timeout)
        .await
        .map_err(|e| GsmError::ConnectionFailed(format!("PDU mode not supported: {e}")))?;

    let model = match conn.execute(&Command::Model, timeout).await {
        Ok(frames) => frames.into_iter().find_map(|frame| match frame {
            Frame::Information(line) if !line.is_empty() => Some(line),
            _ => None,
        }),
        Err(e) => {
            debug!(error = %e, "model query failed");
            None
        }
    };

    Ok(model)
}
