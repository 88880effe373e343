use std::time::Duration;

/// Tunables for the Metrics Collector's four independent tickers (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct MetricsConfig {
    pub docker_stats_interval: Duration,
    pub rcon_interval: Duration,
    pub disk_interval: Duration,
    pub slp_interval: Duration,
    pub slp_timeout: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            docker_stats_interval: Duration::from_secs(5),
            rcon_interval: Duration::from_secs(10),
            disk_interval: Duration::from_secs(60),
            slp_interval: Duration::from_secs(15),
            slp_timeout: Duration::from_secs(5),
        }
    }
}
