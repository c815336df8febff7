use core::f64::consts::{PI, TAU};

/// Cutoff frequencies at or below this value disable low-pass filtering
pub const CUTOFF_DISABLED_HZ: f64 = 0.001;

/// Remainder of `a / n` with the sign of the divisor.
///
/// `%` truncates toward zero, so a negative dividend yields a negative
/// remainder; the modulus is added back in that case.
pub fn modulo(a: f64, n: f64) -> f64 {
    let r = a % n;
    if r < 0.0 {
        r + n
    } else {
        r
    }
}

/// Wrap `x` into the half-open interval (-half, half]
fn normalize(x: f64, half: f64) -> f64 {
    if x > -half && x <= half {
        return x;
    }
    let full = 2.0 * half;
    let r = modulo(x + half, full) - half;
    // modulo lands on 0 for odd multiples of `half`, which maps to the excluded lower bound
    if r <= -half {
        r + full
    } else {
        r
    }
}

/// Normalize an angle to the range (-π, π]
pub fn normalize_radians(rad: f64) -> f64 {
    normalize(rad, PI)
}

/// Normalize an angle to the range (-180, 180]
pub fn normalize_degrees(deg: f64) -> f64 {
    normalize(deg, 180.0)
}

/// Calculate the angular difference `a - b` in radians, wrapped to (-π, π]
pub fn angle_diff(a: f64, b: f64) -> f64 {
    normalize_radians(a - b)
}

/// Smoothing factor of a first-order low-pass filter for a step of `dt_seconds`
pub fn low_pass_alpha(dt_seconds: f64, cutoff_hz: f64) -> f64 {
    let omega_dt = TAU * dt_seconds.max(0.0) * cutoff_hz;
    omega_dt / (omega_dt + 1.0)
}

/// One step of the complementary low-pass filter on an angle in radians.
///
/// With `cutoff_hz` at or below [`CUTOFF_DISABLED_HZ`] the raw angle is
/// returned normalized. Otherwise the output moves from `previous_output`
/// towards `new_angle_raw` by `alpha` along the shorter arc. This deviates from
/// the plain linear blend `alpha * new + (1 - alpha) * previous` only when the
/// two angles are more than π apart, i.e. across the ±π seam, where the linear
/// blend would swing through zero. A long `dt_seconds` pushes alpha towards 1
/// and discounts the stale previous output.
pub fn low_pass_step(
    new_angle_raw: f64,
    previous_output: f64,
    dt_seconds: f64,
    cutoff_hz: f64,
) -> f64 {
    if cutoff_hz <= CUTOFF_DISABLED_HZ {
        return normalize_radians(new_angle_raw);
    }
    let alpha = low_pass_alpha(dt_seconds, cutoff_hz);
    normalize_radians(previous_output + alpha * angle_diff(new_angle_raw, previous_output))
}
