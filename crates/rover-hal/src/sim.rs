//! In-process simulated transport for CI/CD testing without a robot.
//!
//! [`SimTransport`] plays back scripted controller output, records every byte
//! written to it, and can answer specific control bytes with canned replies
//! so request/response exchanges (drive mode) run headless.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use rover_hal::{LineReader, LineSource, SimTransport};
//!
//! let sim = SimTransport::new("sim0").with_lines(&["DD,90", "END"]);
//! let mut reader = LineReader::new(sim);
//!
//! let line = reader.next_line(Duration::from_millis(10)).unwrap();
//! assert_eq!(line.as_deref(), Some("DD,90"));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rover_types::RoverError;

use crate::transport::Transport;

const MAX_IDLE_WAIT: Duration = Duration::from_millis(20);

/// A scripted transport.  Clones share the same state, so a test can keep a
/// handle to inspect writes after moving the transport into a session.
#[derive(Clone)]
pub struct SimTransport {
    id: String,
    inner: Arc<Mutex<SimState>>,
}

#[derive(Default)]
struct SimState {
    incoming: VecDeque<u8>,
    written: Vec<u8>,
    replies: HashMap<u8, Vec<u8>>,
    disconnect_when_drained: bool,
}

impl SimTransport {
    /// Create an idle simulated link with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inner: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// Queue `lines` as controller output, each terminated with `\r\n` the
    /// way the firmware sends them.
    pub fn with_lines(self, lines: &[&str]) -> Self {
        self.push_lines(lines);
        self
    }

    /// When a control byte `byte` is written, queue `lines` as the reply.
    pub fn with_reply(self, byte: u8, lines: &[&str]) -> Self {
        self.state().replies.insert(byte, encode_lines(lines));
        self
    }

    /// Fail reads with [`RoverError::Transport`] once the script runs out,
    /// as if the cable was pulled.
    pub fn disconnect_when_drained(self) -> Self {
        self.state().disconnect_when_drained = true;
        self
    }

    /// Queue more controller output.
    pub fn push_lines(&self, lines: &[&str]) {
        self.push_bytes(&encode_lines(lines));
    }

    /// Queue raw bytes, e.g. to split a line across reads.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.state().incoming.extend(bytes.iter().copied());
    }

    /// Every byte written so far.
    pub fn written(&self) -> Vec<u8> {
        self.state().written.clone()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn encode_lines(lines: &[&str]) -> Vec<u8> {
    lines
        .iter()
        .flat_map(|line| line.bytes().chain(*b"\r\n"))
        .collect()
}

impl Transport for SimTransport {
    fn id(&self) -> &str {
        &self.id
    }

    fn read(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize, RoverError> {
        let mut state = self.state();
        if state.incoming.is_empty() {
            if state.disconnect_when_drained {
                return Err(RoverError::Transport(format!(
                    "{}: simulated disconnect",
                    self.id
                )));
            }
            // Idle like a real port so polling loops do not spin.
            drop(state);
            std::thread::sleep(timeout.min(MAX_IDLE_WAIT));
            return Ok(0);
        }
        let n = state.incoming.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(state.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), RoverError> {
        let mut state = self.state();
        state.written.extend_from_slice(data);
        for byte in data {
            if let Some(reply) = state.replies.get(byte).cloned() {
                state.incoming.extend(reply);
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RoverError> {
        Ok(())
    }
}
