//! `rover-decoder` – turns controller lines into structured telemetry.
//!
//! Everything here is synchronous and transport-free; the session loop in
//! `rover-runtime` feeds it one line at a time.
//!
//! # Modules
//!
//! - [`classifier`] – [`classify`][classifier::classify]: longest-prefix
//!   dispatch of a raw line into a typed [`Record`][classifier::Record].
//! - [`assembler`] – the ping, sweep and object-segment grouping machines.
//! - [`decoder`] – [`TelemetryDecoder`][decoder::TelemetryDecoder]: owns the
//!   assemblers and the session's [`ScanSeries`][rover_types::ScanSeries] and
//!   routes each line to the right one.
//! - [`pose`] – [`PoseAccumulator`][pose::PoseAccumulator]: integrates
//!   heading increments reported while driving.
//! - [`mapper`] – [`map_sample`][mapper::map_sample]: polar sample to map
//!   frame point for the current pose.
//! - [`replay`] – [`replay_file`][replay::replay_file]: loads an offline
//!   `degree ir sonar` table into a series.
//! - [`objects`] – [`detect_objects`][objects::detect_objects]: infrared
//!   threshold object detection over a sweep.

pub mod assembler;
pub mod classifier;
pub mod decoder;
pub mod mapper;
pub mod objects;
pub mod pose;
pub mod replay;

pub use assembler::GroupKind;
pub use classifier::{classify, FieldKind, HeadingIncrement, Record, TurnDirection};
pub use decoder::{Decoded, Flush, TelemetryDecoder};
pub use mapper::{map_sample, map_samples};
pub use objects::{detect_objects, DetectedObject};
pub use pose::PoseAccumulator;
pub use replay::{parse_table, replay_file};
