use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which of the runtime's two framed log streams (or a synthetic console
/// stream) an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStream {
    Stdout,
    Stderr,
    Command,
    CommandOutput,
}

/// One line (or frame) of container output, stamped with a monotonically
/// increasing per-container sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub stream: LogStream,
    pub text: String,
}
