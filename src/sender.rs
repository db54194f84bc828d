//! Packet transmission boundary.
//!
//! A [`PacketSender`] takes a fully-built chain, serializes it, and hands the
//! bytes to the network. Units that can originate a transmission expose a
//! send operation at their own layer: network-layer units address by
//! destination ([`PacketSender::send_l3`]), link-layer units that support
//! origination implement the [`LinkSend`] capability and transmit on an
//! interface. Senders that have no link-level path simply keep the default
//! `send_l2` body, which reports the operation as unsupported.
//!
//! Two socket-backed senders are provided: a synchronous one over raw
//! sockets and an async one driven by the Tokio runtime.

use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::iface::NetworkInterface;
use crate::ip::Ipv4Address;
use crate::{PacketError, Pdu};

/// Accepts fully-built chains for transmission.
pub trait PacketSender {
    /// Serializes the chain and transmits it to `destination` at the network
    /// layer.
    ///
    /// # Returns
    /// * `Ok(usize)` - The number of bytes sent
    /// * `Err(PacketError)` - If serialization-side sending fails
    fn send_l3(&mut self, pdu: &mut dyn Pdu, destination: Ipv4Address)
        -> Result<usize, PacketError>;

    /// Serializes the chain and transmits it on `iface` at the link layer.
    ///
    /// Senders without a link-level transmission path keep this default body.
    fn send_l2(
        &mut self,
        _pdu: &mut dyn Pdu,
        _iface: &NetworkInterface,
    ) -> Result<usize, PacketError> {
        Err(PacketError::UnsupportedOperation(
            "link-level transmission is not available on this sender",
        ))
    }
}

/// Capability of originating a link-layer transmission.
///
/// Only units whose link type actually supports origination implement this;
/// on everything else the operation does not exist at all.
pub trait LinkSend {
    fn send(&mut self, sender: &mut dyn PacketSender) -> Result<usize, PacketError>;
}

/// A synchronous sender over a raw IPv4 socket.
///
/// The socket is opened with the header-included option set: serialized
/// chains carry their own IP header, so the kernel must not prepend one.
pub struct RawSocketSender {
    socket: Socket,
    is_blocking: bool,
}

impl RawSocketSender {
    /// Creates a raw socket sender for the specified protocol.
    ///
    /// For sending chains that begin with their own IPv4 header, the
    /// conventional protocol is `Protocol::from(255)` (IPPROTO_RAW).
    pub fn new(protocol: Protocol) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(protocol))?;
        socket.set_header_included_v4(true)?;

        Ok(Self {
            socket,
            is_blocking: true,
        })
    }

    /// Sets the socket to blocking or non-blocking mode.
    pub fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        self.socket.set_nonblocking(nonblocking)?;
        self.is_blocking = !nonblocking;
        Ok(())
    }

    pub fn is_blocking(&self) -> bool {
        self.is_blocking
    }

    /// Sets the write timeout, or disables it with `None`.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_write_timeout(timeout)?;
        Ok(())
    }

    /// Binds the socket to a local address.
    pub fn bind(&self, addr: Ipv4Address) -> io::Result<()> {
        let sock_addr = SocketAddr::V4(SocketAddrV4::new(addr.into(), 0));
        self.socket.bind(&SockAddr::from(sock_addr))?;
        Ok(())
    }
}

impl PacketSender for RawSocketSender {
    fn send_l3(
        &mut self,
        pdu: &mut dyn Pdu,
        destination: Ipv4Address,
    ) -> Result<usize, PacketError> {
        let bytes = pdu.serialize();
        let sock_addr = SockAddr::from(SocketAddr::V4(SocketAddrV4::new(destination.into(), 0)));
        let sent = self.socket.send_to(&bytes, &sock_addr)?;
        Ok(sent)
    }
}

/// An asynchronous sender over a raw IPv4 socket, driven by Tokio.
pub struct AsyncRawSocketSender {
    socket: tokio::net::UdpSocket,
}

impl AsyncRawSocketSender {
    /// Creates an async raw socket sender for the specified protocol.
    pub async fn new(protocol: Protocol) -> io::Result<Self> {
        let std_socket = Socket::new(Domain::IPV4, Type::RAW, Some(protocol))?;
        std_socket.set_header_included_v4(true)?;
        std_socket.set_nonblocking(true)?;

        let socket = tokio::net::UdpSocket::from_std(std_socket.into())?;

        Ok(Self { socket })
    }

    /// Serializes the chain and transmits it to `destination` at the network
    /// layer.
    pub async fn send_l3(
        &self,
        pdu: &mut dyn Pdu,
        destination: Ipv4Address,
    ) -> Result<usize, PacketError> {
        let bytes = pdu.serialize();
        let sock_addr = SocketAddr::V4(SocketAddrV4::new(destination.into(), 0));
        let sent = self.socket.send_to(&bytes, sock_addr).await?;
        Ok(sent)
    }
}
