//! Generic `Transport` trait for the byte link to the sensor controller.
//!
//! Sessions only ever talk to the trait, so the serial driver can be swapped
//! for [`SimTransport`][crate::sim::SimTransport] without touching decoding
//! logic.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use rover_types::RoverError;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

/// A bidirectional byte link (serial port, simulator, …).
pub trait Transport: Send {
    /// Stable identifier for this link, e.g. `"/dev/ttyUSB0"`.
    fn id(&self) -> &str;

    /// Read available bytes into `buffer`, waiting at most `timeout`.
    ///
    /// Returns `Ok(0)` when nothing arrived before the timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Transport`] when the link is disconnected or the
    /// read fails unrecoverably.
    fn read(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize, RoverError>;

    /// Write all of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Transport`] if the bytes cannot be written.
    fn write_all(&mut self, data: &[u8]) -> Result<(), RoverError>;

    /// Block until written bytes have left the host.
    fn flush(&mut self) -> Result<(), RoverError>;
}

/// Serial driver for the controller's UART link (8N1, no flow control).
pub struct SerialTransport {
    path: String,
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl SerialTransport {
    /// Open the serial device at `path`.
    ///
    /// `timeout` is the initial read timeout; each [`Transport::read`] call
    /// adjusts it to the caller's remaining budget.
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self, RoverError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| RoverError::Transport(format!("failed to open {path}: {e}")))?;

        info!(port = %path, baud_rate, "Opened serial port");

        Ok(Self {
            path: path.to_string(),
            port,
            timeout,
        })
    }
}

impl Transport for SerialTransport {
    fn id(&self) -> &str {
        &self.path
    }

    fn read(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize, RoverError> {
        if timeout != self.timeout {
            self.port
                .set_timeout(timeout)
                .map_err(|e| RoverError::Transport(format!("{}: {e}", self.path)))?;
            self.timeout = timeout;
        }
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                debug!(port = %self.path, "serial read timed out");
                Ok(0)
            }
            Err(e) => Err(RoverError::Transport(format!("{}: {e}", self.path))),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), RoverError> {
        self.port
            .write_all(data)
            .map_err(|e| RoverError::Transport(format!("{}: {e}", self.path)))
    }

    fn flush(&mut self) -> Result<(), RoverError> {
        self.port
            .flush()
            .map_err(|e| RoverError::Transport(format!("{}: {e}", self.path)))
    }
}
