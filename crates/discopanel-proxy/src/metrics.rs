use std::sync::atomic::AtomicU64;

/// Counters surfaced by the proxy for observability; not part of the wire
/// contract, just in-memory tallies a metrics sampler can read.
#[derive(Default)]
pub struct ProxyMetrics {
    pub connections_routed: AtomicU64,
    pub unknown_vhost: AtomicU64,
    pub handshake_errors: AtomicU64,
    pub handshake_timeouts: AtomicU64,
    pub backend_dial_failures: AtomicU64,
}
