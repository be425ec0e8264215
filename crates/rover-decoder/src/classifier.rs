//! Record Classifier.
//!
//! Maps one controller line to a typed [`Record`].  Dispatch goes through a
//! fixed prefix table ordered longest tag first, and a tag only matches when
//! it is followed by the `,` separator or the end of the line.  That keeps the
//! overlapping tags `S`, `SD`, `SON` and `Start` apart: `SON,12` can never be
//! read as a speed setting.
//!
//! `END` is never a prefix; only the exact line `END` terminates a session.
//!
//! # Example
//!
//! ```rust
//! use rover_decoder::classifier::{classify, Record};
//!
//! assert_eq!(classify("Start,80").unwrap(), Record::PingStart(80.0));
//! assert_eq!(classify("SON,42").unwrap(), Record::Sonar(42.0));
//! assert_eq!(classify("END").unwrap(), Record::End);
//! ```

use rover_types::{RoverError, StatusField, StatusUpdate, WarningEvent};

/// Every tag the controller protocol defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    BumperLeft,
    BumperRight,
    CliffLeft,
    CliffRight,
    LineLeft,
    LineRight,
    Speed,
    SweepAngle,
    Infrared,
    Sonar,
    SegmentStart,
    SegmentEnd,
    Distance,
    PingEnd,
    PingStart,
    Warning,
    HeadingNegative,
    HeadingPositive,
    Diagnostic,
    End,
}

impl FieldKind {
    /// Wire tag for this field.
    pub fn tag(self) -> &'static str {
        match self {
            FieldKind::BumperLeft => "BL",
            FieldKind::BumperRight => "BR",
            FieldKind::CliffLeft => "CL",
            FieldKind::CliffRight => "CR",
            FieldKind::LineLeft => "LL",
            FieldKind::LineRight => "LR",
            FieldKind::Speed => "S",
            FieldKind::SweepAngle => "DEG",
            FieldKind::Infrared => "IR",
            FieldKind::Sonar => "SON",
            FieldKind::SegmentStart => "SD",
            FieldKind::SegmentEnd => "ED",
            FieldKind::Distance => "DIS",
            FieldKind::PingEnd => "DD",
            FieldKind::PingStart => "Start",
            FieldKind::Warning => "W",
            FieldKind::HeadingNegative => "anglen",
            FieldKind::HeadingPositive => "anglep",
            FieldKind::Diagnostic => "data",
            FieldKind::End => "END",
        }
    }
}

/// Prefix dispatch table, longest tag first.  `END` is matched separately.
const PREFIX_TABLE: [(&str, FieldKind); 19] = [
    ("anglen", FieldKind::HeadingNegative),
    ("anglep", FieldKind::HeadingPositive),
    ("Start", FieldKind::PingStart),
    ("data", FieldKind::Diagnostic),
    ("DEG", FieldKind::SweepAngle),
    ("SON", FieldKind::Sonar),
    ("DIS", FieldKind::Distance),
    ("BL", FieldKind::BumperLeft),
    ("BR", FieldKind::BumperRight),
    ("CL", FieldKind::CliffLeft),
    ("CR", FieldKind::CliffRight),
    ("LL", FieldKind::LineLeft),
    ("LR", FieldKind::LineRight),
    ("IR", FieldKind::Infrared),
    ("SD", FieldKind::SegmentStart),
    ("ED", FieldKind::SegmentEnd),
    ("DD", FieldKind::PingEnd),
    ("S", FieldKind::Speed),
    ("W", FieldKind::Warning),
];

const SEPARATOR: char = ',';
const END_MARKER: &str = "END";
const GOAL_MARKER: &str = "WIN";

/// A line split into its tag and payload.  Borrowed from the raw line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryLine<'a> {
    pub raw: &'a str,
    pub kind: FieldKind,
    pub payload: &'a str,
}

/// Split `line` into tag and payload.  Returns `None` when no tag matches.
pub fn split(line: &str) -> Option<TelemetryLine<'_>> {
    if line == END_MARKER {
        return Some(TelemetryLine {
            raw: line,
            kind: FieldKind::End,
            payload: "",
        });
    }
    PREFIX_TABLE.iter().find_map(|&(tag, kind)| {
        let rest = line.strip_prefix(tag)?;
        let payload = if rest.is_empty() {
            rest
        } else {
            rest.strip_prefix(SEPARATOR)?
        };
        Some(TelemetryLine {
            raw: line,
            kind,
            payload: payload.trim(),
        })
    })
}

/// Direction tag of a heading increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDirection {
    /// `anglep`
    Positive,
    /// `anglen`
    Negative,
}

/// A raw heading increment as reported by the controller (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadingIncrement {
    pub direction: TurnDirection,
    pub raw: i32,
}

/// A classified controller line.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Status(StatusUpdate),
    SweepAngle(f64),
    Infrared(f64),
    Sonar(f64),
    PingEnd(f64),
    PingStart(f64),
    /// Ping distance in centimetres.
    Distance(f64),
    SegmentStart(String),
    SegmentEnd(String),
    Warning(WarningEvent),
    Heading(HeadingIncrement),
    Diagnostic(String),
    Goal,
    End,
    Blank,
    Unknown(String),
}

/// Classify one terminator-stripped line.
///
/// # Errors
///
/// Returns [`RoverError::Parse`] when a numeric field carries a payload that
/// is not a finite number (or not an integer, for heading increments).
pub fn classify(line: &str) -> Result<Record, RoverError> {
    if line.trim().is_empty() {
        return Ok(Record::Blank);
    }
    if line == GOAL_MARKER {
        return Ok(Record::Goal);
    }
    let Some(parsed) = split(line) else {
        return Ok(Record::Unknown(line.to_string()));
    };
    let kind = parsed.kind;
    let payload = parsed.payload;

    let record = match kind {
        FieldKind::BumperLeft => sensor(StatusField::BumperLeft, payload),
        FieldKind::BumperRight => sensor(StatusField::BumperRight, payload),
        FieldKind::CliffLeft => sensor(StatusField::CliffLeft, payload),
        FieldKind::CliffRight => sensor(StatusField::CliffRight, payload),
        FieldKind::LineLeft => sensor(StatusField::LineLeft, payload),
        FieldKind::LineRight => sensor(StatusField::LineRight, payload),
        FieldKind::Speed => Record::Status(StatusUpdate::Speed(number(kind, payload)?)),
        FieldKind::SweepAngle => Record::SweepAngle(number(kind, payload)?),
        FieldKind::Infrared => Record::Infrared(number(kind, payload)?),
        FieldKind::Sonar => Record::Sonar(number(kind, payload)?),
        FieldKind::PingEnd => Record::PingEnd(number(kind, payload)?),
        FieldKind::PingStart => Record::PingStart(number(kind, payload)?),
        FieldKind::Distance => Record::Distance(number(kind, payload)?),
        FieldKind::SegmentStart => Record::SegmentStart(payload.to_string()),
        FieldKind::SegmentEnd => Record::SegmentEnd(payload.to_string()),
        FieldKind::Warning => Record::Warning(WarningEvent {
            message: payload.to_string(),
        }),
        FieldKind::HeadingPositive => Record::Heading(HeadingIncrement {
            direction: TurnDirection::Positive,
            raw: integer(kind, payload)?,
        }),
        FieldKind::HeadingNegative => Record::Heading(HeadingIncrement {
            direction: TurnDirection::Negative,
            raw: integer(kind, payload)?,
        }),
        FieldKind::Diagnostic => Record::Diagnostic(payload.to_string()),
        FieldKind::End => Record::End,
    };
    Ok(record)
}

fn sensor(field: StatusField, payload: &str) -> Record {
    Record::Status(StatusUpdate::Sensor {
        field,
        value: payload.to_string(),
    })
}

fn number(kind: FieldKind, payload: &str) -> Result<f64, RoverError> {
    match payload.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(RoverError::parse(kind.tag(), payload)),
    }
}

fn integer(kind: FieldKind, payload: &str) -> Result<i32, RoverError> {
    payload
        .parse::<i32>()
        .map_err(|_| RoverError::parse(kind.tag(), payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_table_is_longest_first() {
        for pair in PREFIX_TABLE.windows(2) {
            assert!(
                pair[0].0.len() >= pair[1].0.len(),
                "{} listed before longer tag {}",
                pair[0].0,
                pair[1].0
            );
        }
    }

    #[test]
    fn prefix_table_tags_match_field_kinds() {
        for (tag, kind) in PREFIX_TABLE {
            assert_eq!(kind.tag(), tag);
        }
    }

    #[test]
    fn overlapping_s_tags_are_distinct() {
        assert_eq!(
            classify("S,100").unwrap(),
            Record::Status(StatusUpdate::Speed(100.0))
        );
        assert_eq!(classify("SON,37").unwrap(), Record::Sonar(37.0));
        assert_eq!(
            classify("SD,12").unwrap(),
            Record::SegmentStart("12".to_string())
        );
        assert_eq!(classify("Start,80").unwrap(), Record::PingStart(80.0));
    }

    #[test]
    fn status_fields_keep_string_payload() {
        assert_eq!(
            classify("CR,1").unwrap(),
            Record::Status(StatusUpdate::Sensor {
                field: StatusField::CliffRight,
                value: "1".to_string()
            })
        );
        assert_eq!(
            classify("LL, 1450 ").unwrap(),
            Record::Status(StatusUpdate::Sensor {
                field: StatusField::LineLeft,
                value: "1450".to_string()
            })
        );
    }

    #[test]
    fn end_is_exact_match_only() {
        assert_eq!(classify("END").unwrap(), Record::End);
        assert_eq!(
            classify("ENDING").unwrap(),
            Record::Unknown("ENDING".to_string())
        );
        assert_eq!(
            classify("END,1").unwrap(),
            Record::Unknown("END,1".to_string())
        );
    }

    #[test]
    fn tag_requires_separator_boundary() {
        assert_eq!(
            classify("Speedy").unwrap(),
            Record::Unknown("Speedy".to_string())
        );
        assert_eq!(
            classify("garbage").unwrap(),
            Record::Unknown("garbage".to_string())
        );
        assert_eq!(
            classify("1200, 1300, 800, 950").unwrap(),
            Record::Unknown("1200, 1300, 800, 950".to_string())
        );
    }

    #[test]
    fn warning_and_goal_are_distinct() {
        assert_eq!(
            classify("W,Left Impact").unwrap(),
            Record::Warning(WarningEvent {
                message: "Left Impact".to_string()
            })
        );
        assert_eq!(classify("WIN").unwrap(), Record::Goal);
    }

    #[test]
    fn heading_increments_parse_signed_integers() {
        assert_eq!(
            classify("anglen,-12").unwrap(),
            Record::Heading(HeadingIncrement {
                direction: TurnDirection::Negative,
                raw: -12
            })
        );
        assert_eq!(
            classify("anglep,7").unwrap(),
            Record::Heading(HeadingIncrement {
                direction: TurnDirection::Positive,
                raw: 7
            })
        );
        assert!(matches!(
            classify("anglep,7.5"),
            Err(RoverError::Parse { .. })
        ));
    }

    #[test]
    fn malformed_numbers_are_parse_errors() {
        let err = classify("DIS,abc").unwrap_err();
        assert_eq!(err, RoverError::parse("DIS", "abc"));
        assert!(matches!(classify("DEG,"), Err(RoverError::Parse { .. })));
        assert!(matches!(classify("IR,NaN"), Err(RoverError::Parse { .. })));
    }

    #[test]
    fn diagnostic_and_blank_lines() {
        assert_eq!(
            classify("data,raw dump").unwrap(),
            Record::Diagnostic("raw dump".to_string())
        );
        assert_eq!(classify("").unwrap(), Record::Blank);
        assert_eq!(classify("   ").unwrap(), Record::Blank);
    }

    #[test]
    fn split_exposes_tag_and_payload() {
        let line = split("DEG,1.5708").unwrap();
        assert_eq!(line.kind, FieldKind::SweepAngle);
        assert_eq!(line.payload, "1.5708");
        assert_eq!(line.raw, "DEG,1.5708");
        assert!(split("nothing").is_none());
    }
}
