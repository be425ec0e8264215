//! Line source – decoded text lines on top of a byte [`Transport`].
//!
//! The controller sends one ASCII record per line terminated by `\r\n`
//! (sometimes `\n\r\n`).  [`LineReader`] buffers raw bytes, splits on `\n`,
//! strips the terminators and hands back one line per call.  A read timeout
//! is not an error: it yields `Ok(None)` and the caller simply polls again.
//! A run of more than [`MAX_LINE_BYTES`] without a terminator is dropped up
//! to the next `\n`.

use std::time::{Duration, Instant};

use rover_types::{DriveCommand, RoverError};
use tracing::{debug, trace, warn};

use crate::transport::Transport;

const READ_CHUNK: usize = 256;

/// Longest partial line kept while waiting for its terminator.
pub const MAX_LINE_BYTES: usize = 1024;

/// Exclusive access to the controller link, line by line.
pub trait LineSource: Send {
    /// Return the next complete line, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when no full line arrived in time; any partial line
    /// stays buffered for the next call.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Transport`] when the link is gone.  This is fatal
    /// to the current session.
    fn next_line(&mut self, timeout: Duration) -> Result<Option<String>, RoverError>;

    /// Write one control byte and flush it.
    fn send_control(&mut self, command: DriveCommand) -> Result<(), RoverError>;

    /// Forget bytes buffered by a previous session.
    fn restart(&mut self) {}
}

impl<S: LineSource + ?Sized> LineSource for Box<S> {
    fn next_line(&mut self, timeout: Duration) -> Result<Option<String>, RoverError> {
        (**self).next_line(timeout)
    }

    fn send_control(&mut self, command: DriveCommand) -> Result<(), RoverError> {
        (**self).send_control(command)
    }

    fn restart(&mut self) {
        (**self).restart()
    }
}

/// [`LineSource`] over any [`Transport`].
pub struct LineReader<T: Transport> {
    transport: T,
    pending: Vec<u8>,
    /// Dropping the tail of an overlong line until its terminator arrives.
    discarding: bool,
}

impl<T: Transport> LineReader<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            pending: Vec::with_capacity(READ_CHUNK),
            discarding: false,
        }
    }

    /// Borrow the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=end).collect();
        let line = String::from_utf8_lossy(&raw)
            .trim_end_matches(['\r', '\n'])
            .trim_start_matches('\r')
            .to_string();
        trace!(line = %line, "line received");
        Some(line)
    }

    fn absorb(&mut self, mut bytes: &[u8]) {
        if self.discarding {
            let Some(end) = bytes.iter().position(|&b| b == b'\n') else {
                return;
            };
            self.discarding = false;
            bytes = &bytes[end + 1..];
        }
        self.pending.extend_from_slice(bytes);
        if self.pending.len() > MAX_LINE_BYTES && !self.pending.contains(&b'\n') {
            warn!(
                link = %self.transport.id(),
                bytes = self.pending.len(),
                "line too long; discarding until the next terminator"
            );
            self.pending.clear();
            self.discarding = true;
        }
    }
}

impl<T: Transport> LineSource for LineReader<T> {
    fn next_line(&mut self, timeout: Duration) -> Result<Option<String>, RoverError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let n = self.transport.read(&mut chunk, remaining)?;
            if n == 0 {
                return Ok(None);
            }
            self.absorb(&chunk[..n]);
        }
    }

    fn send_control(&mut self, command: DriveCommand) -> Result<(), RoverError> {
        debug!(link = %self.transport.id(), ?command, "sending control byte");
        self.transport.write_all(&[command.as_byte()])?;
        self.transport.flush()
    }

    fn restart(&mut self) {
        if !self.pending.is_empty() {
            debug!(bytes = self.pending.len(), "discarding buffered bytes");
        }
        self.pending.clear();
        self.discarding = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTransport;

    const POLL: Duration = Duration::from_millis(10);

    #[test]
    fn yields_lines_in_order_without_terminators() {
        let sim = SimTransport::new("sim").with_lines(&["BL,0", "Start,80", "END"]);
        let mut reader = LineReader::new(sim);
        assert_eq!(reader.next_line(POLL).unwrap().as_deref(), Some("BL,0"));
        assert_eq!(reader.next_line(POLL).unwrap().as_deref(), Some("Start,80"));
        assert_eq!(reader.next_line(POLL).unwrap().as_deref(), Some("END"));
        assert_eq!(reader.next_line(POLL).unwrap(), None);
    }

    #[test]
    fn timeout_is_an_empty_poll() {
        let mut reader = LineReader::new(SimTransport::new("sim"));
        assert_eq!(reader.next_line(POLL).unwrap(), None);
    }

    #[test]
    fn partial_line_survives_timeout() {
        let sim = SimTransport::new("sim");
        sim.push_bytes(b"DIS,1");
        let mut reader = LineReader::new(sim.clone());
        assert_eq!(reader.next_line(POLL).unwrap(), None);

        sim.push_bytes(b"50\r\n");
        assert_eq!(reader.next_line(POLL).unwrap().as_deref(), Some("DIS,150"));
    }

    #[test]
    fn firmware_double_terminator_yields_blank_line() {
        let sim = SimTransport::new("sim");
        sim.push_bytes(b"END\n\r\n");
        let mut reader = LineReader::new(sim);
        assert_eq!(reader.next_line(POLL).unwrap().as_deref(), Some("END"));
        assert_eq!(reader.next_line(POLL).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn disconnect_propagates_as_transport_error() {
        let sim = SimTransport::new("sim").disconnect_when_drained();
        let mut reader = LineReader::new(sim);
        assert!(matches!(
            reader.next_line(POLL),
            Err(RoverError::Transport(_))
        ));
    }

    #[test]
    fn send_control_writes_single_byte() {
        let sim = SimTransport::new("sim");
        let mut reader = LineReader::new(sim.clone());
        reader.send_control(DriveCommand::Space).unwrap();
        reader.send_control(DriveCommand::TurnRight).unwrap();
        assert_eq!(sim.written(), b" d");
    }

    #[test]
    fn unterminated_flood_is_capped_and_next_line_survives() {
        let sim = SimTransport::new("sim");
        sim.push_bytes(&[b'x'; 5 * MAX_LINE_BYTES]);
        let mut reader = LineReader::new(sim.clone());
        for _ in 0..5 {
            assert_eq!(reader.next_line(POLL).unwrap(), None);
            assert!(reader.pending.len() <= MAX_LINE_BYTES);
        }

        sim.push_bytes(b"xxx\r\nS,100\r\n");
        assert_eq!(reader.next_line(POLL).unwrap().as_deref(), Some("S,100"));
        assert_eq!(reader.next_line(POLL).unwrap(), None);
    }

    #[test]
    fn restart_discards_buffered_bytes() {
        let sim = SimTransport::new("sim");
        sim.push_bytes(b"garb");
        let mut reader = LineReader::new(sim.clone());
        assert_eq!(reader.next_line(POLL).unwrap(), None);
        reader.restart();
        sim.push_bytes(b"S,100\r\n");
        assert_eq!(reader.next_line(POLL).unwrap().as_deref(), Some("S,100"));
    }
}
