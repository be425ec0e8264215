use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

mod series;

pub use series::ScanSeries;

/// Compass quadrant the robot is oriented to.
///
/// Headings are measured clockwise from north, so `E` is centred on 90°.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Facing {
    #[default]
    N,
    E,
    S,
    W,
}

impl Facing {
    /// Quadrant containing `heading_degrees`.  Each facing covers the 90°
    /// window centred on its axis; boundaries round clockwise.
    pub fn from_heading(heading_degrees: f64) -> Self {
        let h = heading_degrees.rem_euclid(360.0);
        match (((h + 45.0) / 90.0).floor() as u32) % 4 {
            0 => Facing::N,
            1 => Facing::E,
            2 => Facing::S,
            _ => Facing::W,
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facing::N => write!(f, "N"),
            Facing::E => write!(f, "E"),
            Facing::S => write!(f, "S"),
            Facing::W => write!(f, "W"),
        }
    }
}

impl FromStr for Facing {
    type Err = RoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "north" => Ok(Facing::N),
            "e" | "east" => Ok(Facing::E),
            "s" | "south" => Ok(Facing::S),
            "w" | "west" => Ok(Facing::W),
            other => Err(RoverError::Config(format!("unknown facing '{other}'"))),
        }
    }
}

/// A completed polar reading.  Immutable once emitted by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanSample {
    pub angle_degrees: f64,
    pub distance_meters: f64,
}

impl ScanSample {
    pub fn new(angle_degrees: f64, distance_meters: f64) -> Self {
        Self {
            angle_degrees,
            distance_meters,
        }
    }
}

/// A Cartesian point in the shared map frame (metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

/// Robot pose in the shared map frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// X position (metres).
    pub x: f64,
    /// Y position (metres).
    pub y: f64,
    /// Heading in `[0, 360)` degrees, clockwise from north.
    pub heading_degrees: f64,
    pub facing: Facing,
}

impl Pose {
    /// A pose at `(x, y)` with the given facing and a heading on that
    /// facing's axis.
    pub fn at(x: f64, y: f64, facing: Facing) -> Self {
        let heading_degrees = match facing {
            Facing::N => 0.0,
            Facing::E => 90.0,
            Facing::S => 180.0,
            Facing::W => 270.0,
        };
        Self {
            x,
            y,
            heading_degrees,
            facing,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::at(0.0, 0.0, Facing::N)
    }
}

/// Named binary/analog sensor status fields reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusField {
    BumperLeft,
    BumperRight,
    CliffLeft,
    CliffRight,
    LineLeft,
    LineRight,
}

/// One last-write-wins status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatusUpdate {
    Sensor { field: StatusField, value: String },
    Speed(f64),
}

/// Latest value of every status field.  Fields are independent; there is no
/// ordering relation between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorStatus {
    pub bumper_left: Option<String>,
    pub bumper_right: Option<String>,
    pub cliff_left: Option<String>,
    pub cliff_right: Option<String>,
    pub line_left: Option<String>,
    pub line_right: Option<String>,
    pub speed: Option<f64>,
}

impl SensorStatus {
    /// Overwrite the field named by `update`.
    pub fn apply(&mut self, update: &StatusUpdate) {
        match update {
            StatusUpdate::Speed(speed) => self.speed = Some(*speed),
            StatusUpdate::Sensor { field, value } => {
                *self.slot_mut(*field) = Some(value.clone());
            }
        }
    }

    /// Latest value of `field`, if one has been received.
    pub fn get(&self, field: StatusField) -> Option<&str> {
        let slot = match field {
            StatusField::BumperLeft => &self.bumper_left,
            StatusField::BumperRight => &self.bumper_right,
            StatusField::CliffLeft => &self.cliff_left,
            StatusField::CliffRight => &self.cliff_right,
            StatusField::LineLeft => &self.line_left,
            StatusField::LineRight => &self.line_right,
        };
        slot.as_deref()
    }

    fn slot_mut(&mut self, field: StatusField) -> &mut Option<String> {
        match field {
            StatusField::BumperLeft => &mut self.bumper_left,
            StatusField::BumperRight => &mut self.bumper_right,
            StatusField::CliffLeft => &mut self.cliff_left,
            StatusField::CliffRight => &mut self.cliff_right,
            StatusField::LineLeft => &mut self.line_left,
            StatusField::LineRight => &mut self.line_right,
        }
    }
}

/// A warning raised by the controller (`W,<message>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningEvent {
    pub message: String,
}

/// Composite record produced by an `SD` / `ED` / `DIS` triplet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSegment {
    pub start_descriptor: String,
    pub end_descriptor: String,
    /// Distance as transmitted by the controller (centimetres).
    pub distance_cm: f64,
}

/// Single-byte commands written to the controller.
///
/// The byte values are fixed by the controller firmware's drive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveCommand {
    Forward,
    Reverse,
    TurnLeft,
    TurnRight,
    SpeedUp,
    SpeedDown,
    PlayTune,
    QuarterTurn,
    ThreeQuarterTurn,
    CarefulAdvance,
    /// Starts a scan session and stops drive mode.
    Space,
}

impl DriveCommand {
    /// The byte written to the transport.
    pub fn as_byte(self) -> u8 {
        match self {
            DriveCommand::Forward => b'w',
            DriveCommand::Reverse => b's',
            DriveCommand::TurnLeft => b'a',
            DriveCommand::TurnRight => b'd',
            DriveCommand::SpeedUp => b'+',
            DriveCommand::SpeedDown => b'-',
            DriveCommand::PlayTune => b'p',
            DriveCommand::QuarterTurn => b'q',
            DriveCommand::ThreeQuarterTurn => b'e',
            DriveCommand::CarefulAdvance => b'z',
            DriveCommand::Space => b' ',
        }
    }

    /// Parse an operator keystroke.  Returns `None` for keys the firmware
    /// does not understand.
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'w' => Some(DriveCommand::Forward),
            's' => Some(DriveCommand::Reverse),
            'a' => Some(DriveCommand::TurnLeft),
            'd' => Some(DriveCommand::TurnRight),
            '+' => Some(DriveCommand::SpeedUp),
            '-' => Some(DriveCommand::SpeedDown),
            'p' => Some(DriveCommand::PlayTune),
            'q' => Some(DriveCommand::QuarterTurn),
            'e' => Some(DriveCommand::ThreeQuarterTurn),
            'z' => Some(DriveCommand::CarefulAdvance),
            ' ' => Some(DriveCommand::Space),
            _ => None,
        }
    }
}

/// Which operation a session performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    /// Ping scan: `DD` / `Start` / `DIS` triplets mapped onto the floor plan.
    Scan,
    /// Status fields, sweep readings and object segments.
    Sweep,
    /// Manual drive with heading accumulation.
    Drive,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionOutcome {
    /// The `END` terminator was received.
    Completed,
    /// The operator sent the stop byte.
    Aborted,
    /// A drive session was ended by a controller warning.
    Warned,
}

/// Category of a non-fatal problem reported during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    Parse,
    Integrity,
    UnsupportedFacing,
    IncompleteGroup,
    OutOfSequence,
    Other,
}

/// A problem the session reported without aborting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultReport {
    pub kind: FaultKind,
    pub message: String,
}

impl FaultReport {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&RoverError> for FaultReport {
    fn from(err: &RoverError) -> Self {
        let kind = match err {
            RoverError::Parse { .. } => FaultKind::Parse,
            RoverError::Integrity { .. } => FaultKind::Integrity,
            RoverError::UnsupportedFacing(_) => FaultKind::UnsupportedFacing,
            _ => FaultKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

/// Event envelope delivered from a session to its consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "rover-runtime::session"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Everything a session can tell its consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Status(StatusUpdate),
    /// A completed ping sample.
    Sample(ScanSample),
    /// A ping sample placed in the map frame.
    Point(Point2),
    /// The sweep collected during the session, emitted when it ends.
    Sweep(ScanSeries),
    Object(ObjectSegment),
    Warning(WarningEvent),
    Pose(Pose),
    /// The controller reported that the goal marker was reached.
    Goal,
    Fault(FaultReport),
    SessionEnded {
        mode: SessionMode,
        outcome: SessionOutcome,
    },
}

/// Error type shared by every rover crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoverError {
    #[error("Parse Error in {field}: '{payload}' is not a valid number")]
    Parse { field: String, payload: String },

    #[error(
        "Integrity Error: sweep sequences diverged (angle={angles}, infrared={infrared}, sonar={sonar})"
    )]
    Integrity {
        angles: usize,
        infrared: usize,
        sonar: usize,
    },

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Unsupported Facing: {0} (only N is implemented)")]
    UnsupportedFacing(Facing),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Config Error: {0}")]
    Config(String),

    #[error("Replay Error on {path}: {details}")]
    Replay { path: String, details: String },
}

impl RoverError {
    /// Shorthand for a [`RoverError::Parse`].
    pub fn parse(field: impl Into<String>, payload: impl Into<String>) -> Self {
        RoverError::Parse {
            field: field.into(),
            payload: payload.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_from_heading_quadrants() {
        assert_eq!(Facing::from_heading(0.0), Facing::N);
        assert_eq!(Facing::from_heading(44.9), Facing::N);
        assert_eq!(Facing::from_heading(45.0), Facing::E);
        assert_eq!(Facing::from_heading(90.0), Facing::E);
        assert_eq!(Facing::from_heading(180.0), Facing::S);
        assert_eq!(Facing::from_heading(270.0), Facing::W);
        assert_eq!(Facing::from_heading(-30.0), Facing::N);
        assert_eq!(Facing::from_heading(-60.0), Facing::W);
        assert_eq!(Facing::from_heading(720.0), Facing::N);
    }

    #[test]
    fn facing_parses_letters_and_names() {
        assert_eq!("N".parse::<Facing>().unwrap(), Facing::N);
        assert_eq!("east".parse::<Facing>().unwrap(), Facing::E);
        assert!(matches!(
            "up".parse::<Facing>(),
            Err(RoverError::Config(_))
        ));
    }

    #[test]
    fn sensor_status_is_last_write_wins() {
        let mut status = SensorStatus::default();
        status.apply(&StatusUpdate::Sensor {
            field: StatusField::BumperLeft,
            value: "0".to_string(),
        });
        status.apply(&StatusUpdate::Sensor {
            field: StatusField::BumperLeft,
            value: "1".to_string(),
        });
        status.apply(&StatusUpdate::Speed(125.0));
        assert_eq!(status.get(StatusField::BumperLeft), Some("1"));
        assert_eq!(status.get(StatusField::BumperRight), None);
        assert_eq!(status.speed, Some(125.0));
    }

    #[test]
    fn drive_command_bytes_round_trip_through_keys() {
        for key in ['w', 's', 'a', 'd', '+', '-', 'p', 'q', 'e', 'z', ' '] {
            let cmd = DriveCommand::from_key(key).expect("known key");
            assert_eq!(cmd.as_byte(), key as u8);
        }
        assert!(DriveCommand::from_key('x').is_none());
    }

    #[test]
    fn pose_at_aligns_heading_with_facing() {
        let pose = Pose::at(1.0, 1.0, Facing::W);
        assert_eq!(pose.heading_degrees, 270.0);
        assert_eq!(Facing::from_heading(pose.heading_degrees), Facing::W);
    }

    #[test]
    fn event_serializes_with_payload() {
        let event = Event::new(
            "rover-runtime::session",
            EventPayload::Sample(ScanSample::new(85.0, 1.5)),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
        assert!(matches!(back.payload, EventPayload::Sample(s) if s == ScanSample::new(85.0, 1.5)));
    }

    #[test]
    fn fault_report_maps_error_kind() {
        let err = RoverError::parse("DIS", "abc");
        let fault = FaultReport::from(&err);
        assert_eq!(fault.kind, FaultKind::Parse);
        assert!(fault.message.contains("abc"));

        let fault = FaultReport::from(&RoverError::UnsupportedFacing(Facing::E));
        assert_eq!(fault.kind, FaultKind::UnsupportedFacing);
    }

    #[test]
    fn rover_error_display() {
        let err = RoverError::Integrity {
            angles: 3,
            infrared: 3,
            sonar: 2,
        };
        assert!(err.to_string().contains("sonar=2"));
        assert!(RoverError::Transport("unplugged".into())
            .to_string()
            .contains("unplugged"));
    }
}
