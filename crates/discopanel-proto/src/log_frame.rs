//! The container runtime's framed stdout/stderr multiplexing protocol: an
//! 8-byte header (`stream: u8, pad[3], length: u32 big-endian`) followed by
//! `length` bytes of payload.

use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFrame {
    pub stream: FrameStream,
    pub payload: Vec<u8>,
}

/// Reads one frame from the runtime's multiplexed log stream. Returns
/// `Ok(None)` on a clean EOF (the pump's cue to stop).
pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> std::io::Result<Option<RuntimeFrame>> {
    let mut header = [0u8; 8];
    match r.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let stream = match header[0] {
        1 => FrameStream::Stdout,
        _ => FrameStream::Stderr,
    };
    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload).await?;

    Ok(Some(RuntimeFrame { stream, payload }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_frame(stream_byte: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + payload.len());
        buf.push(stream_byte);
        buf.extend_from_slice(&[0, 0, 0]);
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[tokio::test]
    async fn reads_a_stdout_frame() {
        let encoded = encode_frame(1, b"hello world\n");
        let mut cursor = &encoded[..];
        let frame = read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(frame.stream, FrameStream::Stdout);
        assert_eq!(frame.payload, b"hello world\n");
    }

    #[tokio::test]
    async fn reads_a_stderr_frame() {
        let encoded = encode_frame(2, b"warn\n");
        let mut cursor = &encoded[..];
        let frame = read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(frame.stream, FrameStream::Stderr);
    }

    #[tokio::test]
    async fn clean_eof_yields_none() {
        let mut cursor: &[u8] = &[];
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }
}
