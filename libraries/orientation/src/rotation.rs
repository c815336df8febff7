use nalgebra as na;

/// Standard gravity in m/s²
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Accelerometer readings whose squared norm is below (0.1 g)² are treated as free fall
const FREE_FALL_GRAVITY_SQUARED: f64 = 0.01 * STANDARD_GRAVITY * STANDARD_GRAVITY;

/// Below this the device is close to free fall or the field points along gravity
const MIN_HORIZONTAL_NORM: f64 = 0.1;

/// Rotation matrix from a rotation-vector reading.
///
/// The reading holds the vector part `(x, y, z)` of a unit quaternion; the
/// scalar part is recovered as `sqrt(1 - x² - y² - z²)`, clamped at zero for
/// readings whose norm drifted slightly above one.
pub fn rotation_from_vector(rotation_vector: &na::Vector3<f64>) -> na::Matrix3<f64> {
    let (x, y, z) = (rotation_vector.x, rotation_vector.y, rotation_vector.z);
    let w = (1.0 - x * x - y * y - z * z).max(0.0).sqrt();
    na::UnitQuaternion::from_quaternion(na::Quaternion::new(w, x, y, z))
        .to_rotation_matrix()
        .into_inner()
}

/// Rotation matrix from a gravity (accelerometer) and geomagnetic field reading.
///
/// The rows are east `H = E × A`, north `M = A × H` and up `A`, all normalized,
/// mapping device coordinates into world coordinates. Returns `None` when the
/// device is in free fall or the field is nearly parallel to gravity, in which
/// case no heading can be derived.
pub fn rotation_from_gravity_and_field(
    gravity: &na::Vector3<f64>,
    geomagnetic: &na::Vector3<f64>,
) -> Option<na::Matrix3<f64>> {
    if gravity.norm_squared() < FREE_FALL_GRAVITY_SQUARED {
        return None;
    }

    let east = geomagnetic.cross(gravity);
    let east_norm = east.norm();
    if east_norm < MIN_HORIZONTAL_NORM {
        return None;
    }

    let east = east / east_norm;
    let up = gravity.normalize();
    let north = up.cross(&east);

    Some(na::Matrix3::from_rows(&[
        east.transpose(),
        north.transpose(),
        up.transpose(),
    ]))
}

/// Convert a rotation matrix to (azimuth, pitch, roll) in radians.
///
/// Azimuth is measured clockwise from magnetic north around the device's
/// z axis, and is the only component the steering angle is derived from.
pub fn orientation_from_rotation(r: &na::Matrix3<f64>) -> na::Vector3<f64> {
    let azimuth = r[(0, 1)].atan2(r[(1, 1)]);
    let pitch = (-r[(2, 1)]).clamp(-1.0, 1.0).asin();
    let roll = (-r[(2, 0)]).atan2(r[(2, 2)]);
    na::Vector3::new(azimuth, pitch, roll)
}

/// Rotation-vector reading of a device lying flat and facing `azimuth` radians.
///
/// Inverse of [`rotation_from_vector`] followed by [`orientation_from_rotation`]
/// for a level device; used by simulated sensor sources.
pub fn flat_rotation_vector(azimuth: f64) -> na::Vector3<f64> {
    na::Vector3::new(0.0, 0.0, -(azimuth / 2.0).sin())
}
