//! The handshake packet every Minecraft connection opens with.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{ProtoError, Result};
use crate::varint::{decode_varint, read_varint_capturing};

/// Maximum bytes accepted for an entire handshake packet (§5 resource
/// ceilings: 16 KiB).
pub const MAX_HANDSHAKE_PACKET_SIZE: usize = 16 * 1024;

/// The max `server_address` length accepted, per the protocol's own string
/// length field being a varint and vanilla capping it at a `u16`-ish limit.
pub const MAX_SERVER_ADDRESS_LEN: usize = 32_767;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    Status,
    Login,
    Transfer,
}

impl TryFrom<i32> for NextState {
    type Error = ProtoError;

    fn try_from(v: i32) -> Result<Self> {
        match v {
            1 => Ok(NextState::Status),
            2 => Ok(NextState::Login),
            3 => Ok(NextState::Transfer),
            other => Err(ProtoError::InvalidNextState(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub server_address: String,
    pub server_port: u16,
    pub next_state: NextState,
}

/// Reads the first packet off a fresh connection, verifying it is a
/// handshake (id `0x00`) and decoding its body. Returns the parsed
/// handshake along with the exact bytes read off the wire, so the caller
/// can replay them verbatim to a backend.
pub async fn read_handshake<R: AsyncRead + Unpin>(r: &mut R) -> Result<(Handshake, Vec<u8>)> {
    let mut raw = Vec::new();

    let len = read_varint_capturing(r, &mut raw).await? as usize;
    if len > MAX_HANDSHAKE_PACKET_SIZE {
        return Err(ProtoError::PacketTooLarge(len, MAX_HANDSHAKE_PACKET_SIZE));
    }

    let mut body = vec![0u8; len];
    r.read_exact(&mut body).await.map_err(|_| ProtoError::Eof)?;
    raw.extend_from_slice(&body);

    let handshake = decode_handshake_body(&body)?;
    Ok((handshake, raw))
}

fn decode_handshake_body(body: &[u8]) -> Result<Handshake> {
    let mut cursor = body;

    let (packet_id, n) = decode_varint(cursor)?;
    if packet_id != 0x00 {
        return Err(ProtoError::WrongPacketId(packet_id));
    }
    cursor = &cursor[n..];

    let (protocol_version, n) = decode_varint(cursor)?;
    cursor = &cursor[n..];

    let (addr_len, n) = decode_varint(cursor)?;
    let addr_len = addr_len as usize;
    if addr_len > MAX_SERVER_ADDRESS_LEN {
        return Err(ProtoError::AddressTooLong(addr_len));
    }
    cursor = &cursor[n..];

    if cursor.len() < addr_len {
        return Err(ProtoError::Incomplete);
    }
    let server_address = std::str::from_utf8(&cursor[..addr_len])
        .map_err(|_| ProtoError::InvalidUtf8)?
        .to_owned();
    cursor = &cursor[addr_len..];

    if cursor.len() < 2 {
        return Err(ProtoError::Incomplete);
    }
    let server_port = u16::from_be_bytes([cursor[0], cursor[1]]);
    cursor = &cursor[2..];

    let (next_state, _n) = decode_varint(cursor)?;
    let next_state = NextState::try_from(next_state)?;

    Ok(Handshake {
        protocol_version,
        server_address,
        server_port,
        next_state,
    })
}

/// Normalises a `server_address` for virtual-host routing: strip a trailing
/// dot, lowercase, and drop any Forge-style `\0FML…` suffix after a NUL.
pub fn normalize_vhost(server_address: &str) -> String {
    let without_forge_suffix = server_address.split('\0').next().unwrap_or("");
    let trimmed = without_forge_suffix.strip_suffix('.').unwrap_or(without_forge_suffix);
    trimmed.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varint::encode_varint_into;

    fn build_handshake_body(protocol_version: i32, address: &str, port: u16, next_state: i32) -> Vec<u8> {
        let mut body = Vec::new();
        encode_varint_into(0x00, &mut body);
        encode_varint_into(protocol_version, &mut body);
        encode_varint_into(address.len() as i32, &mut body);
        body.extend_from_slice(address.as_bytes());
        body.extend_from_slice(&port.to_be_bytes());
        encode_varint_into(next_state, &mut body);
        body
    }

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut framed = Vec::new();
        encode_varint_into(body.len() as i32, &mut framed);
        framed.extend_from_slice(body);
        framed
    }

    #[tokio::test]
    async fn decodes_a_well_formed_status_handshake() {
        let body = build_handshake_body(765, "survival.example.com", 25565, 1);
        let framed = frame(&body);
        let mut cursor = &framed[..];
        let (hs, raw) = read_handshake(&mut cursor).await.unwrap();
        assert_eq!(hs.protocol_version, 765);
        assert_eq!(hs.server_address, "survival.example.com");
        assert_eq!(hs.server_port, 25565);
        assert_eq!(hs.next_state, NextState::Status);
        assert_eq!(raw, framed);
    }

    #[tokio::test]
    async fn non_handshake_packet_id_is_rejected() {
        let mut body = Vec::new();
        encode_varint_into(0x01, &mut body);
        let framed = frame(&body);
        let mut cursor = &framed[..];
        let err = read_handshake(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtoError::WrongPacketId(1)));
    }

    #[test]
    fn address_at_limit_is_accepted_one_over_is_rejected() {
        let ok = "a".repeat(MAX_SERVER_ADDRESS_LEN);
        let body = build_handshake_body(1, &ok, 25565, 1);
        assert!(decode_handshake_body(&body).is_ok());

        let too_long = "a".repeat(MAX_SERVER_ADDRESS_LEN + 1);
        let mut bad_body = Vec::new();
        encode_varint_into(0x00, &mut bad_body);
        encode_varint_into(1, &mut bad_body);
        encode_varint_into(too_long.len() as i32, &mut bad_body);
        bad_body.extend_from_slice(too_long.as_bytes());
        bad_body.extend_from_slice(&25565u16.to_be_bytes());
        encode_varint_into(1, &mut bad_body);
        assert_eq!(
            decode_handshake_body(&bad_body),
            Err(ProtoError::AddressTooLong(too_long.len()))
        );
    }

    #[test]
    fn invalid_next_state_is_rejected() {
        let body = build_handshake_body(1, "host", 25565, 7);
        assert!(matches!(
            decode_handshake_body(&body),
            Err(ProtoError::InvalidNextState(7))
        ));
    }

    #[test]
    fn normalize_strips_dot_lowercases_and_drops_forge_suffix() {
        assert_eq!(normalize_vhost("Survival."), "survival");
        assert_eq!(normalize_vhost("Survival.\0FML2\0somejunk"), "survival");
        assert_eq!(normalize_vhost("ALREADYLOWER"), "alreadylower");
    }
}
