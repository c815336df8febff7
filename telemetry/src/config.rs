use core::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use crate::error::{ConfigError, TransportError};
use crate::fusion::SensorMode;

/// Interval between two transmitted packets
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(50);

/// Capacity of the queue between the sensor callback and the fusion consumer
pub const DEFAULT_QUEUE_CAPACITY: usize = 2;

pub const DEFAULT_ADDRESS: &str = "localhost:15007";

/// Scheme accepted in front of `host:port`
const UDP_SCHEME: &str = "udp";

/// Parameters of one pipeline session, fixed when the session starts
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Target as `host:port`, optionally prefixed with `udp://`
    pub address: String,

    /// Nominal time between two packets
    pub interval: Duration,

    /// Send the accelerometer/magnetometer-only angle next to the fused one
    pub debug_transmit: bool,

    /// Use the rotation-vector sensor as the primary orientation source
    pub use_gyroscope: bool,

    /// Negate the reported steering angle
    pub invert_rotation: bool,

    /// Low-pass cutoff in Hz; zero disables filtering
    pub cutoff_hz: f64,

    /// Number of sensor readings buffered before the oldest is evicted
    pub queue_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            interval: DEFAULT_SEND_INTERVAL,
            debug_transmit: false,
            use_gyroscope: true,
            invert_rotation: false,
            cutoff_hz: 0.0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl TelemetryConfig {
    /// Check every parameter and parse the target address
    pub fn validate(&self) -> Result<TargetAddress, ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidInterval);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }
        if !self.cutoff_hz.is_finite() || self.cutoff_hz < 0.0 {
            return Err(ConfigError::InvalidCutoff(self.cutoff_hz));
        }
        TargetAddress::parse(&self.address)
    }

    /// Sensors to register for this configuration
    pub fn sensor_mode(&self) -> SensorMode {
        SensorMode {
            use_gyroscope: self.use_gyroscope,
            debug_transmit: self.debug_transmit,
        }
    }
}

/// Parsed `host:port` of the remote listener
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetAddress {
    host: String,
    port: u16,
}

impl TargetAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host:port`, `udp://host:port` or `[v6-address]:port`
    pub fn parse(address: &str) -> Result<Self, ConfigError> {
        let address = address.trim();
        let rest = match address.split_once("://") {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case(UDP_SCHEME) => rest,
            Some((scheme, _)) => return Err(ConfigError::UnsupportedScheme(scheme.to_string())),
            None => address,
        };
        let invalid = || ConfigError::InvalidAddress(address.to_string());

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, after) = bracketed.split_once(']').ok_or_else(invalid)?;
            (host, after.strip_prefix(':').ok_or_else(invalid)?)
        } else {
            let mut parts = rest.split(':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(host), Some(port), None) => (host, port),
                _ => return Err(invalid()),
            }
        };

        if host.is_empty() {
            return Err(invalid());
        }
        let port = match port.parse::<u16>() {
            Ok(port) if port != 0 => port,
            _ => return Err(ConfigError::InvalidPort(port.to_string())),
        };

        Ok(Self::new(host, port))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve to the first socket address the host name maps to
    pub fn resolve(&self) -> Result<SocketAddr, TransportError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                address: self.to_string(),
                source,
            })?
            .next()
            .ok_or_else(|| TransportError::NoAddress(self.to_string()))
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
