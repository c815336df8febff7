//! Orientation sensor interface
use core::fmt;
use std::time::Instant;

pub use nalgebra::Vector3;

/// Raw three-axis reading, single precision as sensors deliver it
pub type Vector3d = Vector3<f32>;

/// Kinds of sensor the steering pipeline can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Acceleration including gravity, in m/s²
    Accelerometer,
    /// Ambient magnetic field, in μT
    MagneticField,
    /// Fused attitude as the vector part of a unit quaternion
    RotationVector,
}

impl SensorKind {
    /// All sensor kinds, in registration order
    pub const ALL: [SensorKind; 3] = [
        SensorKind::Accelerometer,
        SensorKind::MagneticField,
        SensorKind::RotationVector,
    ];
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Accelerometer => write!(f, "accelerometer"),
            SensorKind::MagneticField => write!(f, "magnetic field"),
            SensorKind::RotationVector => write!(f, "rotation vector"),
        }
    }
}

/// A single three-axis reading delivered by a sensor source.
///
/// Immutable once created; the source hands ownership to the listener.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    /// Which sensor produced the reading
    pub kind: SensorKind,

    /// Raw axis values (x, y, z) in the sensor's native unit
    pub values: Vector3d,

    /// Monotonic time at which the reading was taken
    pub timestamp: Instant,
}

impl SensorEvent {
    pub fn new(kind: SensorKind, values: Vector3d, timestamp: Instant) -> Self {
        Self {
            kind,
            values,
            timestamp,
        }
    }
}

/// Callback invoked by a sensor source for every delivered reading.
///
/// Runs on whatever thread the source delivers on and must not block.
pub type SampleListener = Box<dyn FnMut(SensorEvent) + Send>;

/// Host capability that delivers orientation sensor readings.
///
/// Readings arrive at an unspecified, sensor-dependent rate and kinds may be
/// interleaved arbitrarily.
pub trait SensorSource {
    /// Start delivering readings of the given kind
    ///
    /// Returns false if the host has no sensor of this kind
    fn register_interest(&mut self, kind: SensorKind) -> bool;

    /// Stop delivering readings of every kind
    fn unregister_all(&mut self);

    /// Install the listener that receives every reading.
    ///
    /// Replaces any previously installed listener.
    fn on_sample(&mut self, listener: SampleListener);
}
