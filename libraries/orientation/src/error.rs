use hal::{SensorKind, Vector3d};
use thiserror::Error;

/// Primary error type for the orientation crate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrientationError {
    /// A sensor reading could not be used
    #[error("Invalid {kind} sample: {message}")]
    InvalidSample {
        /// The sensor that produced the reading
        kind: SensorKind,
        /// Detailed error message
        message: String,
    },
}

/// Result type for orientation operations
pub type OrientationResult<T> = Result<T, OrientationError>;

/// Check that a reading contains only finite values
pub fn check_sample_valid(kind: SensorKind, values: &Vector3d) -> OrientationResult<()> {
    if values.iter().any(|v| !v.is_finite()) {
        Err(OrientationError::InvalidSample {
            kind,
            message: format!(
                "values ({}, {}, {}) contain NaN or infinite components",
                values.x, values.y, values.z
            ),
        })
    } else {
        Ok(())
    }
}
