//! The transport seam.
//!
//! The session controller never touches sockets; everything it needs
//! from the outside world is a stream of packets in and a sink of
//! packets out. Concrete transports implement [`PacketTransport`];
//! the in-tree implementation frames packets over TCP with the
//! length-prefixed codec.

use async_trait::async_trait;
use std::io;
use tokio::net::TcpStream;

use crate::codec::{read_packet, write_packet};
use crate::packet::Packet;

/// A bidirectional packet channel.
#[async_trait]
pub trait PacketTransport: Send {
    /// Sends one packet.
    async fn send(&mut self, packet: &Packet) -> io::Result<()>;

    /// Receives the next packet; `None` on a clean peer shutdown.
    async fn next_packet(&mut self) -> io::Result<Option<Packet>>;
}

/// Packet framing over a TCP stream.
#[derive(Debug)]
pub struct TcpPacketTransport {
    stream: TcpStream,
}

impl TcpPacketTransport {
    /// Wraps a connected stream.
    #[must_use]
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Connects to a listening peer.
    pub async fn connect(addr: &str) -> io::Result<Self> {
        Ok(Self::new(TcpStream::connect(addr).await?))
    }

    /// Consumes the transport, returning the stream.
    #[must_use]
    pub fn into_inner(self) -> TcpStream {
        self.stream
    }
}

#[async_trait]
impl PacketTransport for TcpPacketTransport {
    async fn send(&mut self, packet: &Packet) -> io::Result<()> {
        write_packet(&mut self.stream, packet).await
    }

    async fn next_packet(&mut self) -> io::Result<Option<Packet>> {
        read_packet(&mut self.stream).await
    }
}
