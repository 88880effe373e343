/// Tunables for the Log Streamer, mirroring the resource ceilings in §5.
#[derive(Debug, Clone, Copy)]
pub struct LogStreamerConfig {
    /// Entries retained per container's ring buffer.
    pub ring_capacity: usize,
    /// Entries queued per subscriber before the oldest is dropped.
    pub subscriber_queue_depth: usize,
    /// How long a stopped container's ring buffer is kept around before
    /// being released, in case a late `GetLogs` call still wants it.
    pub stop_grace: std::time::Duration,
}

impl Default for LogStreamerConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 10_000,
            subscriber_queue_depth: 256,
            stop_grace: std::time::Duration::from_secs(10),
        }
    }
}
