// ABOUTME: Opens the byte stream to the modem described by a device configuration
// ABOUTME: Serial ports in production, any AsyncRead + AsyncWrite stream behind the trait for tests

use crate::config::DeviceConfig;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::debug;

/// Turns a loaded configuration into an open stream to the device.
pub trait DeviceOpener: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn open(&self, config: &DeviceConfig) -> io::Result<Self::Stream>;
}

/// Opens the configured serial port, 8N1 with no flow control.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialOpener;

impl DeviceOpener for SerialOpener {
    type Stream = SerialStream;

    fn open(&self, config: &DeviceConfig) -> io::Result<SerialStream> {
        let baud_rate = config.baud_rate();
        debug!(device = %config.device, baud_rate, "opening serial port");

        tokio_serial::new(&config.device, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(io::Error::from)
    }
}
