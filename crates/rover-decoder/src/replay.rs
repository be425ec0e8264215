//! Batch Replay – offline sweep tables.
//!
//! A replay file holds one whitespace-separated integer triplet per line:
//!
//! ```text
//! <degree> <ir_raw> <sonar_raw>
//! ```
//!
//! There is no header.  Blank lines are skipped.  Degrees are converted to
//! radians so the resulting [`ScanSeries`] has exactly the shape a live sweep
//! produces.

use std::path::Path;

use rover_types::{RoverError, ScanSeries};
use tracing::{debug, info};

/// Parse `text` and append every reading to `series`.
///
/// The whole table is validated before anything is appended, so on error
/// `series` is left untouched.  Returns the number of readings appended.
/// The series is not cleared first; callers that want a fresh replay clear
/// it themselves.
///
/// # Errors
///
/// Returns [`RoverError::Parse`] naming the 1-based line number of the first
/// malformed line.
pub fn parse_table(text: &str, series: &mut ScanSeries) -> Result<usize, RoverError> {
    let mut rows = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        rows.push(parse_row(idx + 1, trimmed)?);
    }
    for &(degree, infrared, sonar) in &rows {
        series.push_reading(f64::from(degree).to_radians(), f64::from(infrared), f64::from(sonar));
    }
    debug!(readings = rows.len(), "replay table parsed");
    Ok(rows.len())
}

fn parse_row(line_no: usize, line: &str) -> Result<(i32, i32, i32), RoverError> {
    let values: Vec<i32> = line
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| RoverError::parse(format!("replay line {line_no}"), line))?;
    match values[..] {
        [degree, infrared, sonar] => Ok((degree, infrared, sonar)),
        _ => Err(RoverError::parse(format!("replay line {line_no}"), line)),
    }
}

/// Read the table at `path` and append it to `series`.
///
/// # Errors
///
/// Returns [`RoverError::Replay`] if the file cannot be read and
/// [`RoverError::Parse`] for malformed content.
pub fn replay_file(path: &Path, series: &mut ScanSeries) -> Result<usize, RoverError> {
    let text = std::fs::read_to_string(path).map_err(|e| RoverError::Replay {
        path: path.display().to_string(),
        details: e.to_string(),
    })?;
    let count = parse_table(&text, series)?;
    info!(path = %path.display(), readings = count, "replay loaded");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const TABLE: &str = "0 120 95\n1 118 94\n\n2 60 40\n";

    #[test]
    fn parses_triplets_into_radian_series() {
        let mut series = ScanSeries::new();
        assert_eq!(parse_table(TABLE, &mut series).unwrap(), 3);
        assert_eq!(series.reading_count(), 3);
        assert!((series.angles_rad()[2] - 2f64.to_radians()).abs() < 1e-12);
        assert_eq!(series.infrared(), &[120.0, 118.0, 60.0]);
        assert_eq!(series.sonar(), &[95.0, 94.0, 40.0]);
        assert!(series.check_integrity().is_ok());
    }

    #[test]
    fn malformed_line_is_named_and_series_untouched() {
        let mut series = ScanSeries::new();
        let err = parse_table("0 1 2\n3 x 5\n", &mut series).unwrap_err();
        assert_eq!(err, RoverError::parse("replay line 2", "3 x 5"));
        assert!(series.is_empty());

        assert!(matches!(
            parse_table("0 1\n", &mut series),
            Err(RoverError::Parse { .. })
        ));
        assert!(matches!(
            parse_table("0 1 2 3\n", &mut series),
            Err(RoverError::Parse { .. })
        ));
        assert!(matches!(
            parse_table("0.5 1 2\n", &mut series),
            Err(RoverError::Parse { .. })
        ));
    }

    #[test]
    fn replay_twice_with_clear_is_identical() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TABLE.as_bytes()).unwrap();

        let mut series = ScanSeries::new();
        replay_file(file.path(), &mut series).unwrap();
        let first = series.clone();
        series.clear();
        replay_file(file.path(), &mut series).unwrap();
        assert_eq!(series, first);
    }

    #[test]
    fn missing_file_is_replay_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut series = ScanSeries::new();
        let err = replay_file(&dir.path().join("absent.txt"), &mut series).unwrap_err();
        assert!(matches!(err, RoverError::Replay { .. }));
    }
}
