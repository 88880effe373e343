use std::sync::atomic::{AtomicBool, Ordering};

use discopanel_types::LogEntry;
use tokio::sync::Notify;

/// A bounded per-subscriber queue built on a `flume` bounded channel:
/// pushing past `depth` drops the oldest queued entry rather than blocking
/// the pump (§4.3's slow-consumer policy). `flume::Sender::try_send` /
/// `Receiver::try_recv` never await, so `push` never blocks regardless of
/// how far behind the subscriber is. `closed_notify` exists only to wake a
/// waiting `recv` when `close` is called while the channel itself is empty
/// and has no new entry incoming — the queue's actual entries always flow
/// through the channel, never through a hand-rolled buffer.
pub struct SubscriberQueue {
    tx: flume::Sender<LogEntry>,
    rx: flume::Receiver<LogEntry>,
    closed: AtomicBool,
    closed_notify: Notify,
}

impl SubscriberQueue {
    pub fn new(depth: usize) -> Self {
        let (tx, rx) = flume::bounded(depth.max(1));
        Self {
            tx,
            rx,
            closed: AtomicBool::new(false),
            closed_notify: Notify::new(),
        }
    }

    /// Never blocks. If the queue is already at capacity, the oldest
    /// queued entry is dropped to make room for `entry`.
    pub fn push(&self, entry: LogEntry) {
        if let Err(flume::TrySendError::Full(entry)) = self.tx.try_send(entry) {
            let _ = self.rx.try_recv();
            let _ = self.tx.try_send(entry);
        }
    }

    /// Waits for and returns the next entry, or `None` once the queue has
    /// been closed (the container was unsubscribed from) and drained.
    pub async fn recv(&self) -> Option<LogEntry> {
        loop {
            if let Ok(entry) = self.rx.try_recv() {
                return Some(entry);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            tokio::select! {
                res = self.rx.recv_async() => return res.ok(),
                _ = self.closed_notify.notified() => {}
            }
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.closed_notify.notify_waiters();
    }
}
