use std::time::Duration;

/// Tunables for the TCP Proxy, mirroring the defaults stated throughout the
/// proxy's design.
#[derive(Debug, Clone, Copy)]
pub struct ProxyConfig {
    /// Read deadline applied while waiting for the client's handshake.
    pub handshake_deadline: Duration,
    /// Buffer size used when splicing bytes in both directions.
    pub splice_buffer_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            handshake_deadline: Duration::from_secs(5),
            splice_buffer_size: 32 * 1024,
        }
    }
}
