use core::fmt;
use std::time::Instant;

use orientation::angle::normalize_degrees;

use crate::error::{ConfigError, SendError, TransportError};

/// Connection status shown to the user.
///
/// Recoverable errors travel through the same channel as normal status and
/// are told apart by content only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Sending,
    NotConnected,
    InvalidAddress,
    InvalidPort(String),
    InvalidConfig(String),
    NoSensors,
    SocketError(String),
    SecurityError,
    SendIoError(String),
    SendSecurityError(String),
    PortUnreachable,
    Unexpected(String),
}

impl LinkStatus {
    pub fn is_error(&self) -> bool {
        !matches!(self, LinkStatus::Sending | LinkStatus::NotConnected)
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Sending => write!(f, "Sending"),
            LinkStatus::NotConnected => write!(f, "Not connected"),
            LinkStatus::InvalidAddress => write!(f, "Invalid address, expected host:port"),
            LinkStatus::InvalidPort(port) => write!(f, "Invalid port: {port}"),
            LinkStatus::InvalidConfig(message) => write!(f, "Invalid configuration: {message}"),
            LinkStatus::NoSensors => write!(f, "No orientation sensor available"),
            LinkStatus::SocketError(message) => write!(f, "Socket error: {message}"),
            LinkStatus::SecurityError => write!(f, "Not permitted to open a socket"),
            LinkStatus::SendIoError(message) => write!(f, "I/O error while sending: {message}"),
            LinkStatus::SendSecurityError(message) => {
                write!(f, "Not permitted to send: {message}")
            }
            LinkStatus::PortUnreachable => write!(f, "Port unreachable"),
            LinkStatus::Unexpected(message) => write!(f, "Unexpected error: {message}"),
        }
    }
}

impl From<&ConfigError> for LinkStatus {
    fn from(err: &ConfigError) -> Self {
        match err {
            ConfigError::InvalidAddress(_) | ConfigError::UnsupportedScheme(_) => {
                LinkStatus::InvalidAddress
            }
            ConfigError::InvalidPort(port) => LinkStatus::InvalidPort(port.clone()),
            other => LinkStatus::InvalidConfig(other.to_string()),
        }
    }
}

impl From<&TransportError> for LinkStatus {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::Security(_) => LinkStatus::SecurityError,
            other => LinkStatus::SocketError(other.to_string()),
        }
    }
}

impl From<&SendError> for LinkStatus {
    fn from(err: &SendError) -> Self {
        match err {
            SendError::Transient(e) => LinkStatus::SendIoError(e.to_string()),
            SendError::Security(e) => LinkStatus::SendSecurityError(e.to_string()),
            SendError::Unreachable(_) => LinkStatus::PortUnreachable,
            SendError::Unexpected(message) => LinkStatus::Unexpected(message.clone()),
        }
    }
}

/// Label of the connect/stop control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonLabel {
    Connect,
    StopSending,
}

impl fmt::Display for ButtonLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonLabel::Connect => write!(f, "Connect"),
            ButtonLabel::StopSending => write!(f, "Stop sending"),
        }
    }
}

/// `(connection status text, button label)` pushed to the observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: LinkStatus,
    pub button: ButtonLabel,
}

impl StatusUpdate {
    pub fn new(status: LinkStatus, button: ButtonLabel) -> Self {
        Self { status, button }
    }

    pub fn text(&self) -> String {
        self.status.to_string()
    }

    pub fn button_label(&self) -> String {
        self.button.to_string()
    }
}

/// Steering angle published after every processed sensor reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AzimuthUpdate {
    /// Timestamp of the reading that produced this update
    pub timestamp: Instant,

    /// Low-pass filtered primary steering angle in radians
    pub azimuth: f64,

    /// Unfiltered accelerometer/magnetometer-only steering angle in radians
    pub azimuth_without_gyro: f64,
}

impl AzimuthUpdate {
    /// Filtered steering angle in degrees, normalized to (-180, 180]
    pub fn degrees(&self) -> f64 {
        normalize_degrees(self.azimuth.to_degrees())
    }
}

/// Receiver of pipeline notifications.
///
/// Calls are fire-and-forget and arrive on pipeline threads; implementations
/// must return quickly.
pub trait TelemetryObserver: Send + Sync {
    fn on_status(&self, _update: &StatusUpdate) {}

    fn on_azimuth(&self, _update: &AzimuthUpdate) {}
}
