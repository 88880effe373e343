use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtoError {
    #[error("incomplete varint")]
    Incomplete,
    #[error("varint is too large (exceeds 5 bytes / 32 bits)")]
    TooLarge,
    #[error("packet id {0} did not match the expected handshake id 0x00")]
    WrongPacketId(i32),
    #[error("server_address length {0} exceeds the 32767 byte limit")]
    AddressTooLong(usize),
    #[error("packet length {0} exceeds the configured maximum of {1}")]
    PacketTooLarge(usize, usize),
    #[error("unexpected end of stream")]
    Eof,
    #[error("next_state {0} is not one of 1 (status), 2 (login), 3 (transfer)")]
    InvalidNextState(i32),
    #[error("malformed utf-8 in string field")]
    InvalidUtf8,
}

pub type Result<T> = std::result::Result<T, ProtoError>;
