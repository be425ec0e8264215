//! `rover-hal` – byte transports and the line source built on them.
//!
//! # Modules
//!
//! - [`transport`] – [`Transport`][transport::Transport] trait and the
//!   [`SerialTransport`][transport::SerialTransport] driver for the robot's
//!   point-to-point serial link.
//! - [`sim`] – [`SimTransport`][sim::SimTransport]: scripted in-memory
//!   transport so sessions run in tests and CI without a robot attached.
//! - [`line_source`] – [`LineSource`][line_source::LineSource] trait and
//!   [`LineReader`][line_source::LineReader], which turns a transport into a
//!   sequence of terminator-stripped text lines.

pub mod line_source;
pub mod sim;
pub mod transport;

pub use line_source::{LineReader, LineSource};
pub use sim::SimTransport;
pub use transport::{SerialTransport, Transport};
