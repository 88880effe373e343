//! Outbound Server List Ping client.
//!
//! Dials a backend as a vanilla Minecraft client would, walking the
//! handshake → status request → status response → ping/pong exchange, and
//! reports the result (or a single unavailable outcome) to the Metrics
//! Collector and the Controller's health checks.

pub mod chat;
pub mod client;
pub mod error;
pub mod protocol_version;

pub use client::{ping, SlpRequest};
pub use error::{Result, SlpUnavailable};
