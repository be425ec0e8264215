//! Coordinate Mapper.
//!
//! Places a polar [`ScanSample`] into the map frame using the current
//! [`Pose`].  Only the north facing is composed; every other facing is
//! rejected with [`RoverError::UnsupportedFacing`] instead of being treated as
//! north.

use rover_types::{Facing, Point2, Pose, RoverError, ScanSample};

/// Map `sample` to a point relative to `pose`.
///
/// # Errors
///
/// Returns [`RoverError::UnsupportedFacing`] when `pose.facing` is not
/// [`Facing::N`].
pub fn map_sample(sample: &ScanSample, pose: &Pose) -> Result<Point2, RoverError> {
    let theta = sample.angle_degrees.to_radians();
    let dx = sample.distance_meters * theta.cos();
    let dy = sample.distance_meters * theta.sin();
    match pose.facing {
        Facing::N => Ok(Point2 {
            x: dx + pose.x,
            y: dy + pose.y,
        }),
        other => Err(RoverError::UnsupportedFacing(other)),
    }
}

/// Map every sample, stopping at the first failure.
pub fn map_samples(samples: &[ScanSample], pose: &Pose) -> Result<Vec<Point2>, RoverError> {
    samples.iter().map(|s| map_sample(s, pose)).collect()
}
