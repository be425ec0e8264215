//! Pose Accumulator.
//!
//! Integrates the `anglep` / `anglen` heading increments reported during a
//! manual drive session into a running [`Pose`].  Both tags add their payload
//! to the heading; the tag only says which key produced the turn.
//!
//! Raw increments are first wrapped into `[-180, 180)` degrees (a turn of
//! more than half a revolution between two reports is indistinguishable from
//! the shorter turn the other way).  The accumulated heading is kept in
//! `[0, 360)` and the facing follows the heading quadrant.
//!
//! # Example
//!
//! ```rust
//! use rover_decoder::classifier::{HeadingIncrement, TurnDirection};
//! use rover_decoder::pose::PoseAccumulator;
//! use rover_types::{Facing, Pose};
//!
//! let mut acc = PoseAccumulator::new(Pose::at(1.0, 1.0, Facing::N));
//! acc.apply(HeadingIncrement { direction: TurnDirection::Negative, raw: -10 });
//! assert_eq!(acc.heading(), 350.0);
//! assert_eq!(acc.pose().facing, Facing::N);
//! ```

use rover_types::{Facing, Pose};
use tracing::debug;

use crate::classifier::HeadingIncrement;

/// Wrap a raw increment (degrees) into `[-180, 180)`.
pub fn normalize_increment(raw: i32) -> f64 {
    ((i64::from(raw) + 180).rem_euclid(360) - 180) as f64
}

/// Owns the session's pose; the only writer of it.
#[derive(Debug, Clone)]
pub struct PoseAccumulator {
    pose: Pose,
}

impl PoseAccumulator {
    pub fn new(start: Pose) -> Self {
        Self { pose: start }
    }

    /// Apply one heading increment and return the updated pose.
    pub fn apply(&mut self, increment: HeadingIncrement) -> Pose {
        let delta = normalize_increment(increment.raw);
        let heading = (self.pose.heading_degrees + delta).rem_euclid(360.0);
        self.pose.heading_degrees = heading;
        self.pose.facing = Facing::from_heading(heading);
        debug!(
            direction = ?increment.direction,
            raw = increment.raw,
            delta,
            heading,
            facing = %self.pose.facing,
            "heading updated"
        );
        self.pose
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn heading(&self) -> f64 {
        self.pose.heading_degrees
    }

    /// Return to `start` (used at session start).
    pub fn reset(&mut self, start: Pose) {
        self.pose = start;
    }
}
