//! A generic length-prefixed Minecraft packet: `uvarint length, uvarint
//! packet_id, payload`. Shared by the TCP Proxy's handshake sniff and the
//! outbound SLP client.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtoError, Result};
use crate::varint::{decode_varint, encode_varint_into, read_varint_capturing};

/// Builds a complete framed packet (length-prefixed `packet_id ++ body`).
pub fn write_packet(packet_id: i32, body: &[u8]) -> Vec<u8> {
    let mut inner = Vec::with_capacity(body.len() + 5);
    encode_varint_into(packet_id, &mut inner);
    inner.extend_from_slice(body);

    let mut framed = Vec::with_capacity(inner.len() + 5);
    encode_varint_into(inner.len() as i32, &mut framed);
    framed.extend_from_slice(&inner);
    framed
}

pub async fn send_packet<W: AsyncWrite + Unpin>(w: &mut W, packet_id: i32, body: &[u8]) -> Result<()> {
    w.write_all(&write_packet(packet_id, body))
        .await
        .map_err(|_| ProtoError::Eof)
}

/// Reads one framed packet, returning its id and body. `max_len` bounds the
/// declared packet length (not counting the length prefix itself).
pub async fn read_packet<R: AsyncRead + Unpin>(r: &mut R, max_len: usize) -> Result<(i32, Vec<u8>)> {
    let (_raw, id, body) = read_packet_capturing(r, max_len).await?;
    Ok((id, body))
}

/// Reads one framed packet exactly as `read_packet` does, but also returns
/// the verbatim bytes read off the wire (length prefix included) so callers
/// that must replay the packet byte-for-byte can do so.
pub async fn read_packet_capturing<R: AsyncRead + Unpin>(
    r: &mut R,
    max_len: usize,
) -> Result<(Vec<u8>, i32, Vec<u8>)> {
    let mut raw = Vec::new();
    let len = read_varint_capturing(r, &mut raw).await? as usize;

    if len > max_len {
        return Err(ProtoError::PacketTooLarge(len, max_len));
    }

    let mut inner = vec![0u8; len];
    r.read_exact(&mut inner).await.map_err(|_| ProtoError::Eof)?;
    raw.extend_from_slice(&inner);

    let (id, id_len) = decode_varint(&inner)?;
    let body = inner[id_len..].to_vec();

    Ok((raw, id, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let framed = write_packet(0x00, b"hello");
        let mut cursor = &framed[..];
        let (id, body) = read_packet(&mut cursor, 1 << 16).await.unwrap();
        assert_eq!(id, 0);
        assert_eq!(body, b"hello");
    }

    #[tokio::test]
    async fn oversize_packet_is_rejected() {
        let framed = write_packet(0x00, &vec![0u8; 100]);
        let mut cursor = &framed[..];
        let err = read_packet(&mut cursor, 10).await.unwrap_err();
        assert!(matches!(err, ProtoError::PacketTooLarge(..)));
    }

    #[tokio::test]
    async fn capturing_read_returns_exact_wire_bytes() {
        let framed = write_packet(0x00, b"abc");
        let mut cursor = &framed[..];
        let (raw, id, body) = read_packet_capturing(&mut cursor, 1 << 16).await.unwrap();
        assert_eq!(raw, framed);
        assert_eq!(id, 0);
        assert_eq!(body, b"abc");
    }
}
