// Slotbridge - Peripheral Card Link Emulator
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Datagram link to the fixed peer process.
//!
//! Delivery is best-effort: a failed send is the caller's warning to log, a
//! failed receive never stops the loop. No retransmission, no ordering
//! beyond what the socket provides.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use crate::CardError;

/// Duplex byte-datagram channel to one fixed peer endpoint.
pub trait Transport: Send + Sync {
    /// Transmit a single-byte datagram to the peer.
    fn send(&self, byte: u8) -> io::Result<()>;

    /// Run indefinitely, handing each received datagram's payload to the
    /// callback in arrival order.
    fn receive_loop(&self, on_bytes: &mut dyn FnMut(&[u8]));
}

/// UDP implementation bound to a fixed local receive port.
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    pub fn bind<L, P>(local: L, peer: P) -> io::Result<Self>
    where
        L: ToSocketAddrs,
        P: ToSocketAddrs,
    {
        let socket = UdpSocket::bind(local)?;
        let peer = peer.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "peer address did not resolve")
        })?;
        Ok(Self { socket, peer })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for UdpTransport {
    fn send(&self, byte: u8) -> io::Result<()> {
        self.socket.send_to(&[byte], self.peer).map(|_| ())
    }

    fn receive_loop(&self, on_bytes: &mut dyn FnMut(&[u8])) {
        let mut buf = [0u8; 256];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((len, _from)) => on_bytes(&buf[..len]),
                Err(e) => {
                    tracing::warn!("{}", CardError::TransportReceive(e));
                }
            }
        }
    }
}
