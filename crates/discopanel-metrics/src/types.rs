use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// The latest sample from each of the four tickers for one server. Every
/// field is independently optional: a field is `None` until its own ticker
/// has completed at least one successful pass.
#[derive(Debug, Clone, Default)]
pub struct ServerMetrics {
    pub cpu_percent: Option<f64>,
    pub memory_mb: Option<f64>,
    pub memory_limit_mb: Option<f64>,
    pub players_online: Option<u32>,
    pub players_max: Option<u32>,
    pub tps: Option<f64>,
    pub world_size_bytes: Option<u64>,
    pub disk_free_bytes: Option<u64>,
    pub slp_latency_ms: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// What a target server needs sampled. Supplied by the Controller when a
/// Server starts running; withdrawn via `forget` on delete or stop.
#[derive(Debug, Clone)]
pub struct MetricsTarget {
    pub server_id: String,
    pub container_id: String,
    pub world_dir: PathBuf,
    pub data_volume: PathBuf,
    /// Argv alternatives tried in order via `Exec` until one yields a
    /// value parsable as a TPS float (§4.6's "per-server TPS command").
    pub tps_commands: Vec<Vec<String>>,
    pub slp_host: String,
    pub slp_port: u16,
    pub game_version: String,
}
