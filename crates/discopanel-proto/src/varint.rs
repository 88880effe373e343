//! The game's LEB128-style varint: up to 5 bytes, 7 bits of payload per
//! byte, continuation bit at `0x80`.

use bytes::{Buf, BufMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{ProtoError, Result};

pub const MAX_SIZE: usize = 5;

/// Number of bytes `encode_varint` will write for `value`.
pub fn written_size(value: i32) -> usize {
    match value {
        0 => 1,
        n => (31 - (n as u32).leading_zeros() as usize) / 7 + 1,
    }
}

pub fn encode_varint(value: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_SIZE);
    encode_varint_into(value, &mut buf);
    buf
}

pub fn encode_varint_into(value: i32, buf: &mut Vec<u8>) {
    let mut v = value as u32;
    loop {
        let mut byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if v == 0 {
            break;
        }
    }
}

/// Decodes a varint from the front of `buf`, returning the value and the
/// number of bytes consumed. A sixth continuation byte is a `TooLarge`
/// error (the wire format caps varints at 5 bytes / 32 bits).
pub fn decode_varint(buf: &[u8]) -> Result<(i32, usize)> {
    let mut cursor = buf;
    let original_len = cursor.len();
    let mut val: i32 = 0;
    for i in 0..MAX_SIZE {
        if !cursor.has_remaining() {
            return Err(ProtoError::Incomplete);
        }
        let byte = cursor.get_u8();
        val |= ((byte & 0x7f) as i32) << (i * 7);
        if byte & 0x80 == 0 {
            return Ok((val, original_len - cursor.len()));
        }
    }
    Err(ProtoError::TooLarge)
}

/// Reads a varint one byte at a time from an async reader, without
/// retaining the bytes read.
pub async fn read_varint_async<R: AsyncRead + Unpin>(r: &mut R) -> Result<i32> {
    read_varint_capturing(r, &mut Vec::new()).await
}

/// Reads a varint one byte at a time, appending every byte read to
/// `capture` so the caller can replay the exact bytes later.
pub async fn read_varint_capturing<R: AsyncRead + Unpin>(r: &mut R, capture: &mut Vec<u8>) -> Result<i32> {
    let mut val: i32 = 0;
    for i in 0..MAX_SIZE {
        let byte = r.read_u8().await.map_err(|_| ProtoError::Eof)?;
        capture.push(byte);
        val |= ((byte & 0x7f) as i32) << (i * 7);
        if byte & 0x80 == 0 {
            return Ok(val);
        }
    }
    Err(ProtoError::TooLarge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn round_trip_is_identity_on_nonnegative_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..100_000 {
            let n = rng.gen_range(0..=i32::MAX);
            let encoded = encode_varint(n);
            assert!(encoded.len() <= MAX_SIZE);
            let (decoded, used) = decode_varint(&encoded).unwrap();
            assert_eq!(decoded, n);
            assert_eq!(used, encoded.len());
        }
    }

    #[test]
    fn written_size_matches_actual_encoding() {
        for n in [0, 1, 127, 128, 16_383, 16_384, i32::MAX, i32::MIN, -1] {
            assert_eq!(encode_varint(n).len(), written_size(n));
        }
    }

    #[test]
    fn sixth_continuation_byte_is_too_large() {
        let overlong = [0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert_eq!(decode_varint(&overlong), Err(ProtoError::TooLarge));
    }

    #[test]
    fn truncated_varint_is_incomplete() {
        let truncated = [0xff, 0xff];
        assert_eq!(decode_varint(&truncated), Err(ProtoError::Incomplete));
    }

    #[tokio::test]
    async fn async_read_matches_sync_decode() {
        for n in [0, 300, 2_097_151, i32::MAX] {
            let encoded = encode_varint(n);
            let mut cursor = &encoded[..];
            let mut capture = Vec::new();
            let got = read_varint_capturing(&mut cursor, &mut capture).await.unwrap();
            assert_eq!(got, n);
            assert_eq!(capture, encoded);
        }
    }
}
