//! A connection-splicing proxy for the Minecraft protocol: reads the
//! client's handshake packet, extracts the requested virtual host, and
//! forwards the raw byte stream to the routed backend container.

pub mod config;
pub mod connection;
pub mod metrics;
pub mod proxy;
pub mod splice;

pub use config::ProxyConfig;
pub use metrics::ProxyMetrics;
pub use proxy::Proxy;
