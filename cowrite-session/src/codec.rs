//! Length-prefixed packet framing.
//!
//! A frame is a 4-byte big-endian payload length followed by the
//! packet's escaped text payload. Oversized frames are rejected before
//! any allocation so a bad peer cannot balloon memory.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::packet::Packet;

/// Maximum frame size (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Reads one length-prefixed packet. Returns `None` on a clean EOF at
/// a frame boundary.
pub async fn read_packet<T: AsyncRead + Unpin>(io: &mut T) -> io::Result<Option<Packet>> {
    let mut len_bytes = [0u8; 4];
    match io.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_be_bytes(len_bytes) as usize;

    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes"),
        ));
    }

    let mut buf = vec![0u8; len];
    io.read_exact(&mut buf).await?;

    let payload = String::from_utf8(buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("bad payload: {e}")))?;
    let packet = Packet::decode(&payload)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("bad packet: {e}")))?;
    trace!(command = packet.command(), "read packet");
    Ok(Some(packet))
}

/// Writes one length-prefixed packet.
pub async fn write_packet<T: AsyncWrite + Unpin>(io: &mut T, packet: &Packet) -> io::Result<()> {
    let payload = packet.encode();

    if payload.len() > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes", payload.len()),
        ));
    }

    io.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    io.write_all(payload.as_bytes()).await?;
    io.flush().await?;
    trace!(command = packet.command(), "wrote packet");
    Ok(())
}
