//! `rover-runtime` – sessions against the robot and process-wide logging.
//!
//! # Modules
//!
//! - [`session`] – [`Session`][session::Session]: the blocking
//!   read → classify → dispatch loop.  It owns the line source for the
//!   duration of a run, publishes [`Event`][rover_types::Event]s over a
//!   `tokio::sync::mpsc` channel and takes drive keys and stop requests from
//!   a second one.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber, with an optional OTLP span exporter when
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` is set.

pub mod session;
pub mod telemetry;

pub use session::{OperatorInput, Session, SessionConfig, SessionReport};
pub use telemetry::{init_tracing, TracerProviderGuard};
