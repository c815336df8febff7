use std::io;

use thiserror::Error;

/// Rejected session configuration. Fatal to session start, never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid address '{0}', expected host:port")]
    InvalidAddress(String),

    #[error("Invalid port '{0}'")]
    InvalidPort(String),

    #[error("Unsupported transport scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("Send interval must be greater than zero")]
    InvalidInterval,

    #[error("Sample queue capacity must be greater than zero")]
    InvalidQueueCapacity,

    #[error("Invalid low-pass cutoff frequency {0} Hz")]
    InvalidCutoff(f64),
}

/// Failure to open the outbound connection
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Could not resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("{0} did not resolve to any socket address")]
    NoAddress(String),

    #[error("Could not open socket: {0}")]
    Bind(#[source] io::Error),

    #[error("Could not connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Not permitted to open socket: {0}")]
    Security(#[source] io::Error),
}

/// Failure of a single datagram send, classified by how the session reacts
#[derive(Error, Debug)]
pub enum SendError {
    /// I/O failure; the link is reconnected in place and sending continues
    #[error("I/O error while sending: {0}")]
    Transient(#[source] io::Error),

    /// The send was not permitted; retrying the same operation cannot help
    #[error("Not permitted to send: {0}")]
    Security(#[source] io::Error),

    /// The peer reported itself unreachable; such notices are unreliable and not fatal
    #[error("Destination unreachable: {0}")]
    Unreachable(#[source] io::Error),

    /// Anything else; ends the session
    #[error("Unexpected send failure: {0}")]
    Unexpected(String),
}

impl SendError {
    /// Classify an I/O error raised by a datagram send
    pub fn classify(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => SendError::Security(err),
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable => SendError::Unreachable(err),
            io::ErrorKind::InvalidInput | io::ErrorKind::Unsupported => {
                SendError::Unexpected(err.to_string())
            }
            _ => SendError::Transient(err),
        }
    }

    /// Whether the session can keep running after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SendError::Unexpected(_))
    }
}

impl From<io::Error> for SendError {
    fn from(err: io::Error) -> Self {
        SendError::classify(err)
    }
}

/// Errors returned when starting the steering pipeline
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No orientation sensor available")]
    NoSensors,
}

/// Result type for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;
