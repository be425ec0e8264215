//! [`ScanSeries`] – the samples and sweep readings gathered by one session.

use serde::{Deserialize, Serialize};

use crate::{RoverError, ScanSample};

/// Ordered ping samples plus three parallel sweep sequences.
///
/// The sweep sequences are positionally correlated: index `i` of
/// `angles_rad`, `infrared` and `sonar` form one reading.  Readings are only
/// appended as whole triples, so a series built through this API is always
/// consistent; [`ScanSeries::check_integrity`] guards series that arrive from
/// elsewhere (e.g. deserialised).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSeries {
    samples: Vec<ScanSample>,
    angles_rad: Vec<f64>,
    infrared: Vec<f64>,
    sonar: Vec<f64>,
}

impl ScanSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every sample and reading.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.angles_rad.clear();
        self.infrared.clear();
        self.sonar.clear();
    }

    /// Drop the sweep readings, keeping ping samples.
    pub fn clear_readings(&mut self) {
        self.angles_rad.clear();
        self.infrared.clear();
        self.sonar.clear();
    }

    pub fn push_sample(&mut self, sample: ScanSample) {
        self.samples.push(sample);
    }

    /// Append one sweep reading.  `sonar` is in centimetres.
    pub fn push_reading(&mut self, angle_rad: f64, infrared: f64, sonar: f64) {
        self.angles_rad.push(angle_rad);
        self.infrared.push(infrared);
        self.sonar.push(sonar);
    }

    pub fn samples(&self) -> &[ScanSample] {
        &self.samples
    }

    pub fn angles_rad(&self) -> &[f64] {
        &self.angles_rad
    }

    pub fn infrared(&self) -> &[f64] {
        &self.infrared
    }

    pub fn sonar(&self) -> &[f64] {
        &self.sonar
    }

    /// Number of sweep readings.
    pub fn reading_count(&self) -> usize {
        self.angles_rad.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() && self.angles_rad.is_empty()
    }

    /// Iterate sweep readings as `(angle_rad, infrared, sonar)`.
    pub fn readings(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.angles_rad
            .iter()
            .zip(&self.infrared)
            .zip(&self.sonar)
            .map(|((a, i), s)| (*a, *i, *s))
    }

    /// Sonar readings as polar samples (centimetres converted to metres), so
    /// sweep output feeds the same consumers as ping samples.
    pub fn sonar_samples(&self) -> Vec<ScanSample> {
        self.readings()
            .map(|(angle, _, sonar)| ScanSample::new(angle.to_degrees(), sonar / 100.0))
            .collect()
    }

    /// Fail with [`RoverError::Integrity`] if the sweep sequences differ in
    /// length.
    pub fn check_integrity(&self) -> Result<(), RoverError> {
        let (angles, infrared, sonar) = (
            self.angles_rad.len(),
            self.infrared.len(),
            self.sonar.len(),
        );
        if angles == infrared && infrared == sonar {
            Ok(())
        } else {
            Err(RoverError::Integrity {
                angles,
                infrared,
                sonar,
            })
        }
    }
}
