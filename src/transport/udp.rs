//! UDP transport bound to the local source port
//!
//! The drone streams video back to whatever address/port the start command
//! came from, so the local port is bound explicitly and kept for the whole
//! session.

use super::PacketTransport;
use crate::error::{Error, Result};
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

/// Receive poll window; bounds heartbeat jitter while the loop is blocked
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// UDP transport for one drone connection
pub struct UdpTransport {
    socket: UdpSocket,
    drone_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind the local source port and aim commands at the drone
    pub fn bind(local_port: u16, drone_addr: SocketAddr) -> Result<Self> {
        let bind_addr = SocketAddr::from(([0, 0, 0, 0], local_port));
        let socket = UdpSocket::bind(bind_addr).map_err(|source| Error::Bind {
            addr: bind_addr.to_string(),
            source,
        })?;
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;

        log::info!("Bound UDP socket on {} (drone at {})", bind_addr, drone_addr);
        Ok(Self { socket, drone_addr })
    }
}

impl PacketTransport for UdpTransport {
    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        match self.socket.recv_from(buf) {
            Ok((n, _)) => Ok(Some(n)),
            // Both kinds show up for an elapsed read timeout, depending on platform
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        self.socket
            .send_to(data, self.drone_addr)
            .map_err(Error::Send)
    }
}
