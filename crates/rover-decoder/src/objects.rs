//! Infrared object detection over a sweep.
//!
//! Walks the readings of a [`ScanSeries`] in order.  An object starts when
//! the infrared value drops below the threshold and ends when it rises back
//! to the threshold or the sweep reaches 180°.  An object still open at the
//! last reading is closed there.  The object's distance is the infrared value
//! of the reading just before the end; an object that opens on the last
//! reading has zero width and takes that reading's own infrared value.

use rover_types::ScanSeries;
use serde::{Deserialize, Serialize};

/// Infrared threshold used by the controller firmware.
pub const DEFAULT_THRESHOLD: f64 = 80.0;

const SWEEP_END_DEGREES: f64 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub start_degrees: f64,
    pub end_degrees: f64,
    /// Same unit as the infrared readings.
    pub distance: f64,
    /// Arc width at `distance`.
    pub width: f64,
}

impl DetectedObject {
    fn new(start_degrees: f64, end_degrees: f64, distance: f64) -> Self {
        let half_span = ((end_degrees - start_degrees) / 2.0).to_radians();
        Self {
            start_degrees,
            end_degrees,
            distance,
            width: half_span.tan() * distance * 2.0,
        }
    }
}

/// Find objects in `series` using `threshold` on the infrared channel.
pub fn detect_objects(series: &ScanSeries, threshold: f64) -> Vec<DetectedObject> {
    let readings: Vec<(f64, f64)> = series
        .readings()
        .map(|(angle, infrared, _)| (angle.to_degrees(), infrared))
        .collect();

    let mut objects = Vec::new();
    let mut open: Option<f64> = None;
    for (idx, window) in readings.windows(2).enumerate() {
        let (_, prev_ir) = window[0];
        let (degrees, infrared) = window[1];
        let at_end = (degrees - SWEEP_END_DEGREES).abs() < 1e-6 || idx + 2 == readings.len();
        match open {
            None if infrared < threshold => open = Some(degrees),
            Some(start) if infrared >= threshold || at_end => {
                objects.push(DetectedObject::new(start, degrees, prev_ir));
                open = None;
            }
            _ => {}
        }
    }
    if let (Some(start), Some(&(degrees, infrared))) = (open, readings.last()) {
        objects.push(DetectedObject::new(start, degrees, infrared));
    }
    objects
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(rows: &[(f64, f64)]) -> ScanSeries {
        let mut s = ScanSeries::new();
        for &(deg, ir) in rows {
            s.push_reading(deg.to_radians(), ir, 0.0);
        }
        s
    }

    #[test]
    fn single_object_between_threshold_crossings() {
        let s = series(&[
            (0.0, 200.0),
            (10.0, 50.0),
            (20.0, 40.0),
            (30.0, 200.0),
            (40.0, 200.0),
        ]);
        let objects = detect_objects(&s, DEFAULT_THRESHOLD);
        assert_eq!(objects.len(), 1);
        let obj = objects[0];
        assert!((obj.start_degrees - 10.0).abs() < 1e-9);
        assert!((obj.end_degrees - 30.0).abs() < 1e-9);
        assert_eq!(obj.distance, 40.0);
        let expected = 10f64.to_radians().tan() * 40.0 * 2.0;
        assert!((obj.width - expected).abs() < 1e-9);
    }

    #[test]
    fn object_open_at_sweep_end_is_closed() {
        let s = series(&[(170.0, 200.0), (175.0, 30.0), (178.0, 30.0), (180.0, 30.0)]);
        let objects = detect_objects(&s, DEFAULT_THRESHOLD);
        assert_eq!(objects.len(), 1);
        assert!((objects[0].end_degrees - 180.0).abs() < 1e-9);
    }

    #[test]
    fn object_opening_on_last_reading_is_kept() {
        let s = series(&[(0.0, 200.0), (10.0, 200.0), (20.0, 50.0)]);
        let objects = detect_objects(&s, DEFAULT_THRESHOLD);
        assert_eq!(objects.len(), 1);
        assert!((objects[0].start_degrees - 20.0).abs() < 1e-9);
        assert!((objects[0].end_degrees - 20.0).abs() < 1e-9);
        assert_eq!(objects[0].distance, 50.0);
        assert!(objects[0].width.abs() < 1e-9);
    }

    #[test]
    fn first_reading_never_opens_an_object() {
        let s = series(&[(0.0, 10.0), (1.0, 200.0)]);
        assert!(detect_objects(&s, DEFAULT_THRESHOLD).is_empty());
        assert!(detect_objects(&ScanSeries::new(), DEFAULT_THRESHOLD).is_empty());
    }
}
