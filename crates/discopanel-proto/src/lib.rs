//! Minecraft wire protocol primitives shared by the TCP Proxy, the outbound
//! SLP client, and the Log Streamer's runtime-frame decoder.

pub mod error;
pub mod handshake;
pub mod log_frame;
pub mod packet;
pub mod varint;

pub use error::{ProtoError, Result};
pub use handshake::{normalize_vhost, read_handshake, Handshake, NextState, MAX_HANDSHAKE_PACKET_SIZE, MAX_SERVER_ADDRESS_LEN};
pub use log_frame::{read_frame, FrameStream, RuntimeFrame};
pub use packet::{read_packet, read_packet_capturing, send_packet, write_packet};
pub use varint::{decode_varint, encode_varint, encode_varint_into, read_varint_async, read_varint_capturing, written_size};
