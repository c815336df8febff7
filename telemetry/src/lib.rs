//! # Telemetry - steering angle streaming
//!
//! Fuses orientation sensor readings into a steering angle and streams it to
//! a remote listener as one ASCII datagram per send interval.
//!
//! Data flows sensor source → [`SampleQueue`] → [`FusionConsumer`] →
//! `OrientationState` → [`Transmitter`] → network. [`SteeringPipeline`]
//! starts and stops both halves as a unit.

mod config;
mod error;
mod fusion;
mod link;
mod pipeline;
mod queue;
mod status;
mod transmitter;

pub use config::{
    TargetAddress, TelemetryConfig, DEFAULT_ADDRESS, DEFAULT_QUEUE_CAPACITY, DEFAULT_SEND_INTERVAL,
};
pub use error::{ConfigError, SendError, TelemetryError, TelemetryResult, TransportError};
pub use fusion::{Fusion, FusionConsumer, FusionPhase, SensorMode};
pub use link::{Connector, DatagramLink, UdpConnector, UdpLink, DEFAULT_WRITE_TIMEOUT};
pub use pipeline::SteeringPipeline;
pub use queue::SampleQueue;
pub use status::{AzimuthUpdate, ButtonLabel, LinkStatus, StatusUpdate, TelemetryObserver};
pub use transmitter::{format_payload, pacing_delay, SessionEnd, SessionSummary, Transmitter};
