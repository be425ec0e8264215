//! [`TelemetryDecoder`] – classify one line and route it to the assemblers.
//!
//! The decoder owns the three grouping machines and the session's
//! [`ScanSeries`].  It never fails: malformed lines and protocol slips come
//! back as [`Decoded::Fault`] so the read loop keeps going.
//!
//! Routing order for every line:
//!
//! 1. the exact line `END` flushes and ends the session, even mid-segment;
//! 2. an open object segment consumes the line raw (blank lines excepted);
//! 3. otherwise the line is classified and dispatched by record type.
//!
//! # Example
//!
//! ```rust
//! use rover_decoder::decoder::{Decoded, TelemetryDecoder};
//!
//! let mut decoder = TelemetryDecoder::new();
//! assert_eq!(decoder.feed("DD,90"), Decoded::Pending);
//! assert_eq!(decoder.feed("Start,80"), Decoded::Pending);
//! let Decoded::Sample(sample) = decoder.feed("DIS,150") else { panic!() };
//! assert!((sample.angle_degrees - 85.0).abs() < 1e-9);
//! assert!(matches!(decoder.feed("END"), Decoded::End(_)));
//! ```

use rover_types::{
    FaultKind, FaultReport, ObjectSegment, RoverError, ScanSample, ScanSeries, StatusUpdate,
    WarningEvent,
};
use tracing::{debug, warn};

use crate::assembler::{
    GroupKind, PingAssembler, PingStep, SegmentAssembler, SweepAssembler, SweepField,
};
use crate::classifier::{self, FieldKind, HeadingIncrement, Record};

const END_MARKER: &str = "END";

/// What one line turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Status(StatusUpdate),
    /// A completed ping; already appended to the series.
    Sample(ScanSample),
    /// A full sweep reading was committed to the series.
    SweepReading,
    Object(ObjectSegment),
    Warning(WarningEvent),
    Heading(HeadingIncrement),
    Goal,
    /// The session terminator arrived.
    End(Flush),
    /// The line was accepted into an open group.
    Pending,
    /// Diagnostic, blank or unrecognised line.
    Ignored,
    Fault(FaultReport),
}

/// State handed over when a session ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Flush {
    pub series: ScanSeries,
    /// Set when the sweep fields diverged; the sweep readings were dropped.
    pub integrity: Option<RoverError>,
    /// Groups that were still incomplete and have been discarded.
    pub discarded: Vec<GroupKind>,
}

#[derive(Debug, Default)]
pub struct TelemetryDecoder {
    ping: PingAssembler,
    sweep: SweepAssembler,
    segment: SegmentAssembler,
    series: ScanSeries,
}

impl TelemetryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn series(&self) -> &ScanSeries {
        &self.series
    }

    /// Clear the series and every open group.  Called at session start.
    pub fn reset(&mut self) {
        self.ping.abandon();
        self.sweep.reset();
        self.segment.abandon();
        self.series.clear();
    }

    /// Decode one terminator-stripped line.
    pub fn feed(&mut self, line: &str) -> Decoded {
        if line == END_MARKER {
            return Decoded::End(self.finish());
        }
        if self.segment.in_progress() && !line.trim().is_empty() {
            return match self.segment.feed_raw(line) {
                Ok(Some(object)) => Decoded::Object(object),
                Ok(None) => Decoded::Pending,
                Err(err) => {
                    warn!(line = %line, error = %err, "object segment dropped");
                    Decoded::Fault(FaultReport::from(&err))
                }
            };
        }
        match classifier::classify(line) {
            Ok(record) => self.dispatch(record),
            Err(err) => {
                self.abandon_after_parse_error(line);
                warn!(line = %line, error = %err, "malformed line");
                Decoded::Fault(FaultReport::from(&err))
            }
        }
    }

    /// Seal the session: discard incomplete ping and segment groups and check
    /// the sweep.  The series stays in the decoder until [`reset`].
    ///
    /// [`reset`]: TelemetryDecoder::reset
    pub fn finish(&mut self) -> Flush {
        let mut discarded = Vec::new();
        if self.ping.abandon() {
            discarded.push(GroupKind::Ping);
        }
        if self.segment.abandon() {
            discarded.push(GroupKind::Segment);
        }
        let integrity = self.sweep.seal(&self.series).err();
        if let Some(err) = &integrity {
            warn!(error = %err, "sweep dropped");
            self.series.clear_readings();
        }
        Flush {
            series: self.series.clone(),
            integrity,
            discarded,
        }
    }

    /// Drop every open group after an operator abort.  Committed samples are
    /// kept; committed sweep readings are kept only while the sweep fields are
    /// still aligned, otherwise they are dropped and `integrity` is set.
    pub fn abort(&mut self) -> Flush {
        let mut discarded = Vec::new();
        if self.ping.abandon() {
            discarded.push(GroupKind::Ping);
        }
        let integrity = match self.sweep.interrupt(&self.series) {
            Ok(true) => {
                discarded.push(GroupKind::Sweep);
                None
            }
            Ok(false) => None,
            Err(err) => {
                warn!(error = %err, "sweep dropped on abort");
                self.series.clear_readings();
                Some(err)
            }
        };
        if self.segment.abandon() {
            discarded.push(GroupKind::Segment);
        }
        Flush {
            series: self.series.clone(),
            integrity,
            discarded,
        }
    }

    fn dispatch(&mut self, record: Record) -> Decoded {
        match record {
            Record::Status(update) => Decoded::Status(update),
            Record::SweepAngle(v) => self.sweep_value(SweepField::Angle, v),
            Record::Infrared(v) => self.sweep_value(SweepField::Infrared, v),
            Record::Sonar(v) => self.sweep_value(SweepField::Sonar, v),
            Record::PingEnd(end) => match self.ping.on_end_angle(end) {
                PingStep::Restarted => incomplete(GroupKind::Ping, "restarted by a new DD line"),
                _ => Decoded::Pending,
            },
            Record::PingStart(start) => {
                let step = self.ping.on_start_angle(start);
                self.ping_step(step, FieldKind::PingStart)
            }
            Record::Distance(cm) => {
                let step = self.ping.on_distance(cm);
                self.ping_step(step, FieldKind::Distance)
            }
            Record::SegmentStart(start) => {
                if self.segment.begin(start) {
                    incomplete(GroupKind::Segment, "replaced by a new SD line")
                } else {
                    Decoded::Pending
                }
            }
            Record::SegmentEnd(end) => out_of_sequence(FieldKind::SegmentEnd, &end, false),
            Record::Warning(warning) => Decoded::Warning(warning),
            Record::Heading(increment) => Decoded::Heading(increment),
            Record::Goal => Decoded::Goal,
            Record::End => Decoded::End(self.finish()),
            Record::Diagnostic(payload) => {
                debug!(payload = %payload, "diagnostic line ignored");
                Decoded::Ignored
            }
            Record::Unknown(line) => {
                debug!(line = %line, "unrecognised line ignored");
                Decoded::Ignored
            }
            Record::Blank => Decoded::Ignored,
        }
    }

    fn sweep_value(&mut self, field: SweepField, value: f64) -> Decoded {
        if self.sweep.push(field, value, &mut self.series) {
            Decoded::SweepReading
        } else {
            Decoded::Pending
        }
    }

    fn ping_step(&mut self, step: PingStep, kind: FieldKind) -> Decoded {
        match step {
            PingStep::Complete(sample) => {
                self.series.push_sample(sample);
                debug!(
                    angle = sample.angle_degrees,
                    distance = sample.distance_meters,
                    "ping sample"
                );
                Decoded::Sample(sample)
            }
            PingStep::OutOfSequence { dropped } => out_of_sequence(kind, "", dropped),
            PingStep::Pending | PingStep::Restarted => Decoded::Pending,
        }
    }

    /// A malformed ping field poisons its group.  A malformed sweep field
    /// leaves that field one value short, so the sweep is marked skewed.
    fn abandon_after_parse_error(&mut self, line: &str) {
        let Some(parsed) = classifier::split(line) else {
            return;
        };
        match parsed.kind {
            FieldKind::PingEnd | FieldKind::PingStart | FieldKind::Distance => {
                if self.ping.abandon() {
                    debug!("open ping group abandoned");
                }
            }
            FieldKind::SweepAngle => self.sweep.mark_skewed(SweepField::Angle),
            FieldKind::Infrared => self.sweep.mark_skewed(SweepField::Infrared),
            FieldKind::Sonar => self.sweep.mark_skewed(SweepField::Sonar),
            _ => {}
        }
    }
}

fn incomplete(group: GroupKind, reason: &str) -> Decoded {
    warn!(group = %group, reason, "incomplete group discarded");
    Decoded::Fault(FaultReport::new(
        FaultKind::IncompleteGroup,
        format!("incomplete {group} group discarded: {reason}"),
    ))
}

fn out_of_sequence(kind: FieldKind, payload: &str, dropped: bool) -> Decoded {
    warn!(tag = kind.tag(), payload, dropped, "line out of sequence");
    let mut message = format!("{} line out of sequence", kind.tag());
    if dropped {
        message.push_str("; open ping group discarded");
    }
    Decoded::Fault(FaultReport::new(FaultKind::OutOfSequence, message))
}
