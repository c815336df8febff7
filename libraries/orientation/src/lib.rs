//! # Orientation - steering angle estimation
//!
//! Turns raw orientation sensor readings into a bounded, continuous steering
//! angle relative to a captured straight-ahead reference.
//!
//! ## Modules
//!
//! - **angle**: angle normalization and the complementary low-pass step
//! - **rotation**: rotation matrices from rotation-vector or
//!   accelerometer+magnetometer readings, and Euler angles from those matrices
//! - **state**: the lock-guarded store shared between the fusion consumer and
//!   the transmitter
//! - **filter**: the stateful low-pass filter applied to the primary azimuth

pub mod angle;
pub mod error;
pub mod filter;
pub mod rotation;
pub mod state;

pub use error::{OrientationError, OrientationResult};
pub use filter::{FilterState, LowPassFilter};
pub use state::{Orientation, OrientationState};
