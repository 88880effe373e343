use std::collections::VecDeque;

use discopanel_types::LogEntry;

/// A fixed-capacity, oldest-first-eviction buffer of recent log entries for
/// one container.
pub struct RingBuffer {
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.min(4096)),
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Snapshot of the most recent `tail` entries, oldest-first.
    pub fn tail(&self, tail: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(tail);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use discopanel_types::LogStream;

    fn entry(seq: u64) -> LogEntry {
        LogEntry {
            sequence: seq,
            timestamp: Utc::now(),
            stream: LogStream::Stdout,
            text: format!("line {seq}"),
        }
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut rb = RingBuffer::new(3);
        for i in 1..=5 {
            rb.push(entry(i));
        }
        let all = rb.tail(10);
        assert_eq!(all.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn tail_returns_up_to_n_most_recent() {
        let mut rb = RingBuffer::new(100);
        for i in 1..=10 {
            rb.push(entry(i));
        }
        let last_three = rb.tail(3);
        assert_eq!(last_three.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![8, 9, 10]);
    }

    #[test]
    fn tail_larger_than_len_returns_everything() {
        let mut rb = RingBuffer::new(100);
        rb.push(entry(1));
        rb.push(entry(2));
        assert_eq!(rb.tail(50).len(), 2);
    }
}
