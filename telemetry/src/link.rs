use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use log::{debug, info};

use crate::config::TargetAddress;
use crate::error::{SendError, TransportError};

/// Upper bound on a single blocking send
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// Outbound fire-and-forget datagram connection
pub trait DatagramLink: Send {
    /// Send one payload as a single datagram
    fn send(&mut self, payload: &[u8]) -> Result<(), SendError>;

    /// Drop and re-establish the connection to the same target
    fn reconnect(&mut self) -> Result<(), TransportError>;

    /// Release the connection; later sends fail
    fn close(&mut self);
}

/// Opens links to a target address
pub trait Connector: Send + Sync + 'static {
    type Link: DatagramLink + 'static;

    fn connect(&self, target: &TargetAddress) -> Result<Self::Link, TransportError>;
}

/// Connects UDP sockets bound to an ephemeral local port
#[derive(Debug, Clone, Copy)]
pub struct UdpConnector {
    pub write_timeout: Duration,
}

impl Default for UdpConnector {
    fn default() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl Connector for UdpConnector {
    type Link = UdpLink;

    fn connect(&self, target: &TargetAddress) -> Result<UdpLink, TransportError> {
        let peer = target.resolve()?;
        let local: SocketAddr = match peer {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(local).map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => TransportError::Security(e),
            _ => TransportError::Bind(e),
        })?;
        socket
            .set_write_timeout(Some(self.write_timeout))
            .map_err(TransportError::Bind)?;
        socket.connect(peer).map_err(|source| TransportError::Connect {
            address: target.to_string(),
            source,
        })?;

        info!("UDP link to {} ({}) ready", target, peer);
        Ok(UdpLink {
            socket: Some(socket),
            target: target.clone(),
        })
    }
}

/// Connected UDP socket sending to one peer
#[derive(Debug)]
pub struct UdpLink {
    socket: Option<UdpSocket>,
    target: TargetAddress,
}

impl DatagramLink for UdpLink {
    fn send(&mut self, payload: &[u8]) -> Result<(), SendError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| SendError::Unexpected("link is closed".to_string()))?;
        socket.send(payload)?;
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        let socket = self.socket.as_ref().ok_or_else(|| {
            TransportError::Bind(io::Error::new(io::ErrorKind::NotConnected, "link is closed"))
        })?;
        let peer = self.target.resolve()?;
        socket.connect(peer).map_err(|source| TransportError::Connect {
            address: self.target.to_string(),
            source,
        })?;
        debug!("Reconnected UDP link to {}", peer);
        Ok(())
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!("Closed UDP link to {}", self.target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udp_link_delivers_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut link = UdpConnector::default()
            .connect(&TargetAddress::new("127.0.0.1", port))
            .unwrap();
        link.send(b"0.10000\n").unwrap();

        let mut buf = [0u8; 64];
        let (n, from) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"0.10000\n");
        assert_ne!(from.port(), port, "sender binds its own ephemeral port");

        link.reconnect().unwrap();
        link.send(b"0.20000\n").unwrap();
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"0.20000\n");
    }

    #[test]
    fn test_closed_link_send_is_unexpected() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = receiver.local_addr().unwrap().port();
        let mut link = UdpConnector::default()
            .connect(&TargetAddress::new("127.0.0.1", port))
            .unwrap();
        link.close();
        assert!(matches!(link.send(b"x"), Err(SendError::Unexpected(_))));
        assert!(link.reconnect().is_err());
    }
}
