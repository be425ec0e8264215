//! Scan Assembler – three independent grouping state machines.
//!
//! Each machine walks `IDLE → ACCUMULATING → COMPLETE → emit → IDLE`:
//!
//! | Machine | Lines | Output |
//! |---|---|---|
//! | [`PingAssembler`] | `DD` → `Start` → `DIS` | [`ScanSample`] at the mid angle, distance in metres |
//! | [`SweepAssembler`] | `DEG` / `IR` / `SON`, positionally correlated | readings appended to a [`ScanSeries`] |
//! | [`SegmentAssembler`] | `SD` then the next two raw lines | [`ObjectSegment`] |
//!
//! No sample is ever emitted before its distance arrives.

use std::collections::VecDeque;
use std::fmt;

use rover_types::{ObjectSegment, RoverError, ScanSample, ScanSeries};
use tracing::debug;

/// Which grouping machine a (discarded) group belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Ping,
    Sweep,
    Segment,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::Ping => write!(f, "ping"),
            GroupKind::Sweep => write!(f, "sweep"),
            GroupKind::Segment => write!(f, "object segment"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ping
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum PingState {
    Idle,
    HaveEnd { end: f64 },
    HaveStart { end: f64, start: f64 },
}

/// Result of feeding one line to the [`PingAssembler`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PingStep {
    /// The line was accepted; the group is still open.
    Pending,
    /// A new `DD` arrived while a group was open; the old group was dropped
    /// and the new one started.
    Restarted,
    /// The line does not fit the current state.  Any open group was dropped.
    OutOfSequence { dropped: bool },
    Complete(ScanSample),
}

/// `DD(end) → Start(start) → DIS(cm)` triplet machine.
#[derive(Debug)]
pub struct PingAssembler {
    state: PingState,
}

impl Default for PingAssembler {
    fn default() -> Self {
        Self {
            state: PingState::Idle,
        }
    }
}

impl PingAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_progress(&self) -> bool {
        self.state != PingState::Idle
    }

    pub fn on_end_angle(&mut self, end: f64) -> PingStep {
        let restarted = self.in_progress();
        self.state = PingState::HaveEnd { end };
        if restarted {
            PingStep::Restarted
        } else {
            PingStep::Pending
        }
    }

    pub fn on_start_angle(&mut self, start: f64) -> PingStep {
        match self.state {
            PingState::HaveEnd { end } => {
                self.state = PingState::HaveStart { end, start };
                PingStep::Pending
            }
            _ => PingStep::OutOfSequence {
                dropped: self.abandon(),
            },
        }
    }

    /// `distance_cm` completes the group: angle is the mean of the two
    /// bearings, distance is converted to metres.
    pub fn on_distance(&mut self, distance_cm: f64) -> PingStep {
        match self.state {
            PingState::HaveStart { end, start } => {
                self.state = PingState::Idle;
                PingStep::Complete(ScanSample::new((end + start) / 2.0, distance_cm / 100.0))
            }
            _ => PingStep::OutOfSequence {
                dropped: self.abandon(),
            },
        }
    }

    /// Drop the open group.  Returns `true` if there was one.
    pub fn abandon(&mut self) -> bool {
        let was_open = self.in_progress();
        self.state = PingState::Idle;
        was_open
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sweep
// ────────────────────────────────────────────────────────────────────────────

/// One of the three sweep fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepField {
    Angle,
    Infrared,
    Sonar,
}

/// Correlates `DEG`, `IR` and `SON` values by arrival order.
///
/// Values wait in per-field queues until index `i` is present in all three;
/// the complete reading is then committed to the series in one step, so the
/// series' parallel sequences never differ in length.  Values still waiting
/// when the sweep is sealed mean the fields diverged.
///
/// Once a field has lost a value (see [`SweepAssembler::mark_skewed`]) every
/// later reading is paired off by one, so the whole sweep is rejected when it
/// is sealed or interrupted.
#[derive(Debug, Default)]
pub struct SweepAssembler {
    angles: VecDeque<f64>,
    infrared: VecDeque<f64>,
    sonar: VecDeque<f64>,
    skewed: bool,
}

impl SweepAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `value`; returns `true` if a full reading was committed.
    pub fn push(&mut self, field: SweepField, value: f64, series: &mut ScanSeries) -> bool {
        match field {
            SweepField::Angle => self.angles.push_back(value),
            SweepField::Infrared => self.infrared.push_back(value),
            SweepField::Sonar => self.sonar.push_back(value),
        }
        match (
            self.angles.front(),
            self.infrared.front(),
            self.sonar.front(),
        ) {
            (Some(&angle), Some(&infrared), Some(&sonar)) => {
                self.angles.pop_front();
                self.infrared.pop_front();
                self.sonar.pop_front();
                series.push_reading(angle, infrared, sonar);
                true
            }
            _ => false,
        }
    }

    pub fn in_progress(&self) -> bool {
        !(self.angles.is_empty() && self.infrared.is_empty() && self.sonar.is_empty())
    }

    /// Record that a value of `field` was lost (e.g. a malformed payload).
    pub fn mark_skewed(&mut self, field: SweepField) {
        if !self.skewed {
            debug!(?field, "sweep lost a value; readings no longer aligned");
        }
        self.skewed = true;
    }

    pub fn is_skewed(&self) -> bool {
        self.skewed
    }

    /// Close the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Integrity`] with the per-field totals when any
    /// field received more values than another, or when a value was lost
    /// earlier.  The caller is expected to drop the sweep.
    pub fn seal(&mut self, series: &ScanSeries) -> Result<(), RoverError> {
        if !self.in_progress() && !self.skewed {
            return Ok(());
        }
        let err = self.integrity_error(series);
        self.reset();
        Err(err)
    }

    /// Stop the sweep mid-stream.
    ///
    /// A single partly received reading is discarded and reported as
    /// `Ok(true)`.  More than one pending value in a field means the fields
    /// have already diverged.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Integrity`] when the committed readings can no
    /// longer be trusted; the caller is expected to drop the sweep.
    pub fn interrupt(&mut self, series: &ScanSeries) -> Result<bool, RoverError> {
        let diverged = self.skewed
            || self.angles.len() > 1
            || self.infrared.len() > 1
            || self.sonar.len() > 1;
        if diverged {
            let err = self.integrity_error(series);
            self.reset();
            return Err(err);
        }
        let was_open = self.in_progress();
        self.reset();
        Ok(was_open)
    }

    pub fn reset(&mut self) {
        self.angles.clear();
        self.infrared.clear();
        self.sonar.clear();
        self.skewed = false;
    }

    fn integrity_error(&self, series: &ScanSeries) -> RoverError {
        let committed = series.reading_count();
        RoverError::Integrity {
            angles: committed + self.angles.len(),
            infrared: committed + self.infrared.len(),
            sonar: committed + self.sonar.len(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Object segment
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum SegmentState {
    Idle,
    HaveStart { start: String },
    HaveEnd { start: String, end: String },
}

/// `SD` followed by two lines consumed unconditionally as `ED` and `DIS`.
#[derive(Debug)]
pub struct SegmentAssembler {
    state: SegmentState,
}

impl Default for SegmentAssembler {
    fn default() -> Self {
        Self {
            state: SegmentState::Idle,
        }
    }
}

impl SegmentAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_progress(&self) -> bool {
        self.state != SegmentState::Idle
    }

    /// Open a segment.  Returns `true` if an open segment was replaced.
    pub fn begin(&mut self, start_descriptor: String) -> bool {
        let replaced = self.in_progress();
        self.state = SegmentState::HaveStart {
            start: start_descriptor,
        };
        replaced
    }

    /// Consume the next raw line of an open segment, whatever its prefix.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Parse`] if the third line's distance is not a
    /// number; the segment is dropped.
    pub fn feed_raw(&mut self, line: &str) -> Result<Option<ObjectSegment>, RoverError> {
        match std::mem::replace(&mut self.state, SegmentState::Idle) {
            SegmentState::Idle => Ok(None),
            SegmentState::HaveStart { start } => {
                self.state = SegmentState::HaveEnd {
                    start,
                    end: strip_tag(line, "ED").to_string(),
                };
                Ok(None)
            }
            SegmentState::HaveEnd { start, end } => {
                let payload = strip_tag(line, "DIS");
                let distance_cm = payload
                    .parse::<f64>()
                    .ok()
                    .filter(|d| d.is_finite())
                    .ok_or_else(|| RoverError::parse("DIS", payload))?;
                Ok(Some(ObjectSegment {
                    start_descriptor: start,
                    end_descriptor: end,
                    distance_cm,
                }))
            }
        }
    }

    /// Drop the open segment.  Returns `true` if there was one.
    pub fn abandon(&mut self) -> bool {
        let was_open = self.in_progress();
        self.state = SegmentState::Idle;
        was_open
    }
}

/// Payload of a line expected to carry `tag`: text after `tag,` when present,
/// else after the first separator, else the whole line.
fn strip_tag<'a>(line: &'a str, tag: &str) -> &'a str {
    let payload = line
        .strip_prefix(tag)
        .and_then(|rest| rest.strip_prefix(','))
        .or_else(|| line.split_once(',').map(|(_, rest)| rest))
        .unwrap_or(line);
    payload.trim()
}
