use std::sync::{Mutex, MutexGuard, PoisonError};

use hal::{SensorKind, Vector3d};
use log::trace;
use nalgebra as na;

use crate::angle::normalize_radians;
use crate::error::{check_sample_valid, OrientationResult};
use crate::rotation::{orientation_from_rotation, rotation_from_gravity_and_field, rotation_from_vector};

/// Snapshot of the fused orientation and the straight-ahead references.
///
/// Every component is (azimuth, pitch, roll) in radians, normalized to (-π, π].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    /// Latest primary orientation (rotation vector, or accel+mag without a gyroscope)
    pub current: na::Vector3<f64>,

    /// Latest orientation derived from accelerometer and magnetometer only
    pub current_without_gyro: na::Vector3<f64>,

    /// `current` at the last straight-ahead reset
    pub straight: na::Vector3<f64>,

    /// `current_without_gyro` at the last straight-ahead reset
    pub straight_without_gyro: na::Vector3<f64>,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            current: na::Vector3::zeros(),
            current_without_gyro: na::Vector3::zeros(),
            straight: na::Vector3::zeros(),
            straight_without_gyro: na::Vector3::zeros(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    orientation: Orientation,
    last_gravity: Option<na::Vector3<f64>>,
    last_geomagnetic: Option<na::Vector3<f64>>,
    /// Low-pass filtered primary azimuth, absolute like `orientation.current`
    filtered: Option<f64>,
    use_gyroscope: bool,
    invert_rotation: bool,
}

/// Shared store of the latest fused orientation.
///
/// Written by the fusion consumer and read by the transmitter. One lock covers
/// every operation, so a reader never sees the axes of one update interleaved
/// with those of another.
#[derive(Debug)]
pub struct OrientationState {
    inner: Mutex<Inner>,
}

impl Default for OrientationState {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl OrientationState {
    pub fn new(use_gyroscope: bool, invert_rotation: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                use_gyroscope,
                invert_rotation,
                ..Default::default()
            }),
        }
    }

    // Every writer leaves Inner consistent before it can panic, so a poisoned
    // lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed one sensor reading.
    ///
    /// Returns `Ok(true)` when an orientation was updated, `Ok(false)` when the
    /// reading was stored but no rotation could be derived yet (only one of the
    /// accelerometer/magnetometer pair has arrived, or the pair is degenerate).
    pub fn update(&self, kind: SensorKind, values: &Vector3d) -> OrientationResult<bool> {
        check_sample_valid(kind, values)?;
        let values = values.cast::<f64>();

        let mut inner = self.lock();
        match kind {
            SensorKind::RotationVector => {
                let angles = normalized(orientation_from_rotation(&rotation_from_vector(&values)));
                inner.orientation.current = angles;
                Ok(true)
            }
            SensorKind::Accelerometer | SensorKind::MagneticField => {
                if kind == SensorKind::Accelerometer {
                    inner.last_gravity = Some(values);
                } else {
                    inner.last_geomagnetic = Some(values);
                }

                let (Some(gravity), Some(geomagnetic)) = (inner.last_gravity, inner.last_geomagnetic)
                else {
                    trace!("Waiting for the other half of the accelerometer/magnetometer pair");
                    return Ok(false);
                };
                let Some(rotation) = rotation_from_gravity_and_field(&gravity, &geomagnetic) else {
                    trace!("Accelerometer/magnetometer pair is degenerate, skipping");
                    return Ok(false);
                };

                let angles = normalized(orientation_from_rotation(&rotation));
                inner.orientation.current_without_gyro = angles;
                if !inner.use_gyroscope {
                    inner.orientation.current = angles;
                }
                Ok(true)
            }
        }
    }

    /// Capture the current orientations as the straight-ahead references
    pub fn reset_straight(&self) {
        let mut inner = self.lock();
        inner.orientation.straight = inner.orientation.current;
        inner.orientation.straight_without_gyro = inner.orientation.current_without_gyro;
    }

    /// Steering angle in radians relative to the straight-ahead reference
    pub fn azimuth(&self, without_gyro: bool) -> f64 {
        let inner = self.lock();
        relative_azimuth(&inner, without_gyro)
    }

    /// Primary and accelerometer/magnetometer-only steering angles, read under one lock
    pub fn azimuths(&self) -> (f64, f64) {
        let inner = self.lock();
        (relative_azimuth(&inner, false), relative_azimuth(&inner, true))
    }

    /// Store the low-pass filtered primary azimuth (absolute, radians)
    pub fn set_filtered(&self, azimuth: f64) {
        self.lock().filtered = Some(normalize_radians(azimuth));
    }

    /// Forget the filtered azimuth; reads fall back to the raw one until the
    /// next [`OrientationState::set_filtered`]
    pub fn clear_filtered(&self) {
        self.lock().filtered = None;
    }

    /// Filtered steering angle relative to the straight-ahead reference.
    ///
    /// This is the value streamed to the listener.
    pub fn steering_azimuth(&self) -> f64 {
        filtered_azimuth(&self.lock())
    }

    /// Filtered steering angle and the unfiltered accelerometer/magnetometer-only
    /// angle, read under one lock
    pub fn steering_azimuths(&self) -> (f64, f64) {
        let inner = self.lock();
        (filtered_azimuth(&inner), relative_azimuth(&inner, true))
    }

    /// Copy of the stored orientation
    pub fn snapshot(&self) -> Orientation {
        self.lock().orientation
    }

    /// Select whether accelerometer/magnetometer readings also drive the primary orientation
    pub fn set_use_gyroscope(&self, use_gyroscope: bool) {
        self.lock().use_gyroscope = use_gyroscope;
    }

    pub fn set_invert_rotation(&self, invert_rotation: bool) {
        self.lock().invert_rotation = invert_rotation;
    }
}

fn normalized(angles: na::Vector3<f64>) -> na::Vector3<f64> {
    angles.map(normalize_radians)
}

fn relative_azimuth(inner: &Inner, without_gyro: bool) -> f64 {
    let o = &inner.orientation;
    let (current, straight) = if without_gyro {
        (o.current_without_gyro.x, o.straight_without_gyro.x)
    } else {
        (o.current.x, o.straight.x)
    };
    relative_to(inner, current, straight)
}

fn filtered_azimuth(inner: &Inner) -> f64 {
    let o = &inner.orientation;
    relative_to(inner, inner.filtered.unwrap_or(o.current.x), o.straight.x)
}

fn relative_to(inner: &Inner, current: f64, straight: f64) -> f64 {
    let sign = if inner.invert_rotation { -1.0 } else { 1.0 };
    normalize_radians(sign * (current - straight))
}
