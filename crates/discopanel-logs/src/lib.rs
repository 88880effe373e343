//! The Log Streamer (§4.3): one pump per tracked container that tails the
//! runtime's log frames, keeps a bounded in-memory history, and fans out to
//! any number of subscribers without ever blocking on a slow consumer.

pub mod config;
pub mod ring_buffer;
pub mod streamer;
pub mod subscriber;

pub use config::LogStreamerConfig;
pub use streamer::{LogStreamer, Subscription};
