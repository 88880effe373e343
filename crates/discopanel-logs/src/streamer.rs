use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use discopanel_proto::log_frame::FrameStream;
use discopanel_runtime::RuntimeAdapter;
use discopanel_types::{LogEntry, LogStream};
use futures_util::StreamExt;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::LogStreamerConfig;
use crate::ring_buffer::RingBuffer;
use crate::subscriber::SubscriberQueue;

struct RunningPump {
    handle: tokio::task::JoinHandle<()>,
    cancel: CancellationToken,
}

struct ContainerState {
    ring: Mutex<RingBuffer>,
    subscribers: Mutex<HashMap<Uuid, Arc<SubscriberQueue>>>,
    next_sequence: AtomicU64,
    pump: Mutex<Option<RunningPump>>,
}

impl ContainerState {
    fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(RingBuffer::new(capacity)),
            subscribers: Mutex::new(HashMap::new()),
            next_sequence: AtomicU64::new(1),
            pump: Mutex::new(None),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst)
    }

    async fn publish(&self, entry: LogEntry) {
        self.ring.lock().await.push(entry.clone());
        let subscribers = self.subscribers.lock().await;
        for queue in subscribers.values() {
            queue.push(entry.clone());
        }
    }
}

/// An active subscription returned by `subscribe`. Dropping it does not
/// unsubscribe; call `LogStreamer::unsubscribe` explicitly (mirroring the
/// spec's explicit `unsubscribe` handle rather than an RAII guard, so a
/// subscription can be handed across an API boundary).
pub struct Subscription {
    pub id: Uuid,
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    pub async fn recv(&self) -> Option<LogEntry> {
        self.queue.recv().await
    }
}

/// The Log Streamer (§4.3): one pump task per tracked container id,
/// ring-buffered history, bounded fan-out to many subscribers.
pub struct LogStreamer {
    adapter: Arc<dyn RuntimeAdapter>,
    config: LogStreamerConfig,
    containers: RwLock<HashMap<String, Arc<ContainerState>>>,
}

impl LogStreamer {
    pub fn new(adapter: Arc<dyn RuntimeAdapter>, config: LogStreamerConfig) -> Arc<Self> {
        Arc::new(Self {
            adapter,
            config,
            containers: RwLock::new(HashMap::new()),
        })
    }

    /// Idempotent: spins up the pump only if one isn't already running for
    /// `id`.
    #[instrument(skip(self))]
    pub async fn start_streaming(self: &Arc<Self>, id: &str) {
        {
            let containers = self.containers.read().await;
            if let Some(state) = containers.get(id) {
                if state.pump.lock().await.is_some() {
                    return;
                }
            }
        }

        let state = {
            let mut containers = self.containers.write().await;
            containers
                .entry(id.to_owned())
                .or_insert_with(|| Arc::new(ContainerState::new(self.config.ring_capacity)))
                .clone()
        };

        let mut pump_slot = state.pump.lock().await;
        if pump_slot.is_some() {
            return;
        }

        let streamer = self.clone();
        let task_id = id.to_owned();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            streamer.run_pump(task_id, task_cancel).await;
        });
        *pump_slot = Some(RunningPump { handle, cancel });
    }

    /// Cancels the pump; the ring buffer and subscriber set are kept alive
    /// for `config.stop_grace` before being released.
    #[instrument(skip(self))]
    pub async fn stop_streaming(self: &Arc<Self>, id: &str) {
        let state = {
            let containers = self.containers.read().await;
            containers.get(id).cloned()
        };
        let Some(state) = state else {
            return;
        };

        if let Some(running) = state.pump.lock().await.take() {
            running.cancel.cancel();
            let _ = running.handle.await;
        }

        let streamer = self.clone();
        let id = id.to_owned();
        let grace = self.config.stop_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let mut containers = streamer.containers.write().await;
            // Only release if nobody restarted streaming in the meantime.
            if let Some(current) = containers.get(&id) {
                if current.pump.lock().await.is_none() {
                    containers.remove(&id);
                }
            }
        });
    }

    /// Returns a fresh subscription plus the id used to unsubscribe later.
    /// Callers should seed their view with `get_logs(id, tail)` first.
    pub async fn subscribe(&self, id: &str) -> Subscription {
        let state = self.ensure_state(id).await;
        let queue = Arc::new(SubscriberQueue::new(self.config.subscriber_queue_depth));
        let sub_id = Uuid::new_v4();
        state.subscribers.lock().await.insert(sub_id, queue.clone());
        Subscription { id: sub_id, queue }
    }

    pub async fn unsubscribe(&self, id: &str, subscription_id: Uuid) {
        let containers = self.containers.read().await;
        if let Some(state) = containers.get(id) {
            if let Some(queue) = state.subscribers.lock().await.remove(&subscription_id) {
                queue.close();
            }
        }
    }

    pub async fn get_logs(&self, id: &str, tail: usize) -> Vec<LogEntry> {
        let containers = self.containers.read().await;
        match containers.get(id) {
            Some(state) => state.ring.lock().await.tail(tail),
            None => Vec::new(),
        }
    }

    pub async fn add_command_entry(&self, id: &str, command: &str, ts: chrono::DateTime<Utc>) {
        let state = self.ensure_state(id).await;
        let entry = LogEntry {
            sequence: state.next_sequence(),
            timestamp: ts,
            stream: LogStream::Command,
            text: command.to_owned(),
        };
        state.publish(entry).await;
    }

    pub async fn add_command_output(&self, id: &str, text: &str, success: bool, ts: chrono::DateTime<Utc>) {
        let state = self.ensure_state(id).await;
        let prefix = if success { "" } else { "[error] " };
        let entry = LogEntry {
            sequence: state.next_sequence(),
            timestamp: ts,
            stream: LogStream::CommandOutput,
            text: format!("{prefix}{text}"),
        };
        state.publish(entry).await;
    }

    /// Atomically moves every subscriber queue from `old_id` to `new_id`.
    /// `new_id`'s own sequence counter is untouched (it starts at 1 for a
    /// freshly created container), so subsequent entries are delivered
    /// with a fresh monotonic sequence, matching the recreate scenario.
    #[instrument(skip(self))]
    pub async fn migrate_subscribers(self: &Arc<Self>, old_id: &str, new_id: &str) {
        let old_state = {
            let containers = self.containers.read().await;
            containers.get(old_id).cloned()
        };
        let Some(old_state) = old_state else {
            return;
        };

        let moved: HashMap<Uuid, Arc<SubscriberQueue>> = {
            let mut old_subs = old_state.subscribers.lock().await;
            std::mem::take(&mut *old_subs)
        };
        if moved.is_empty() {
            return;
        }

        let new_state = self.ensure_state(new_id).await;
        new_state.subscribers.lock().await.extend(moved);
        info!(old_id, new_id, "migrated log subscribers across container replacement");
    }

    async fn ensure_state(&self, id: &str) -> Arc<ContainerState> {
        {
            let containers = self.containers.read().await;
            if let Some(state) = containers.get(id) {
                return state.clone();
            }
        }
        let mut containers = self.containers.write().await;
        containers
            .entry(id.to_owned())
            .or_insert_with(|| Arc::new(ContainerState::new(self.config.ring_capacity)))
            .clone()
    }

    async fn run_pump(self: Arc<Self>, id: String, cancel: CancellationToken) {
        let mut frames = match self.adapter.logs(&id).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(%id, error = %e, "log pump failed to open runtime log stream");
                return;
            }
        };

        info!(%id, "log pump started");
        let mut decoder = LineDecoder::default();
        let state = self.ensure_state(&id).await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                frame = frames.next() => {
                    let Some(frame) = frame else {
                        debug!(%id, "log pump reached end of stream");
                        break;
                    };
                    match frame {
                        Ok(frame) => {
                            for (stream, line) in decoder.feed(frame.stream, &frame.payload) {
                                let entry = LogEntry {
                                    sequence: state.next_sequence(),
                                    timestamp: Utc::now(),
                                    stream,
                                    text: line,
                                };
                                state.publish(entry).await;
                            }
                        }
                        Err(e) => {
                            warn!(%id, error = %e, "log pump read error, continuing");
                        }
                    }
                }
            }
        }

        info!(%id, "log pump stopped");
    }
}

/// Accumulates partial frame payloads into complete lines per stream,
/// since a runtime frame boundary has no relation to a text line boundary.
#[derive(Default)]
struct LineDecoder {
    stdout_partial: Vec<u8>,
    stderr_partial: Vec<u8>,
}

impl LineDecoder {
    fn feed(&mut self, stream: FrameStream, payload: &[u8]) -> Vec<(LogStream, String)> {
        let buf = match stream {
            FrameStream::Stdout => &mut self.stdout_partial,
            FrameStream::Stderr => &mut self.stderr_partial,
        };
        buf.extend_from_slice(payload);

        let mut lines = Vec::new();
        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]).trim_end_matches('\r').to_owned();
            let log_stream = match stream {
                FrameStream::Stdout => LogStream::Stdout,
                FrameStream::Stderr => LogStream::Stderr,
            };
            lines.push((log_stream, text));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discopanel_runtime::mock::MockAdapter;

    fn config() -> LogStreamerConfig {
        LogStreamerConfig {
            ring_capacity: 100,
            subscriber_queue_depth: 16,
            stop_grace: std::time::Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn command_entries_are_sequenced_and_visible_via_get_logs() {
        let adapter = MockAdapter::new();
        let streamer = LogStreamer::new(adapter, config());
        streamer.add_command_entry("c1", "say hello", Utc::now()).await;
        streamer.add_command_output("c1", "ok", true, Utc::now()).await;

        let logs = streamer.get_logs("c1", 10).await;
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].sequence, 1);
        assert_eq!(logs[1].sequence, 2);
        assert_eq!(logs[0].stream, LogStream::Command);
        assert_eq!(logs[1].stream, LogStream::CommandOutput);
    }

    #[tokio::test]
    async fn subscriber_receives_published_entries_in_order() {
        let adapter = MockAdapter::new();
        let streamer = LogStreamer::new(adapter, config());
        let sub = streamer.subscribe("c1").await;
        streamer.add_command_entry("c1", "one", Utc::now()).await;
        streamer.add_command_entry("c1", "two", Utc::now()).await;

        assert_eq!(sub.recv().await.unwrap().text, "one");
        assert_eq!(sub.recv().await.unwrap().text, "two");
    }

    #[tokio::test]
    async fn migrate_subscribers_moves_queue_to_new_container() {
        let adapter = MockAdapter::new();
        let streamer = LogStreamer::new(adapter, config());
        let sub = streamer.subscribe("old").await;

        streamer.migrate_subscribers("old", "new").await;
        streamer.add_command_entry("new", "after migration", Utc::now()).await;
        streamer.add_command_entry("old", "should not be delivered", Utc::now()).await;

        let received = sub.recv().await.unwrap();
        assert_eq!(received.text, "after migration");
        assert_eq!(received.sequence, 1);
    }

    #[tokio::test]
    async fn unsubscribe_closes_the_queue() {
        let adapter = MockAdapter::new();
        let streamer = LogStreamer::new(adapter, config());
        let sub = streamer.subscribe("c1").await;
        let id = sub.id;
        streamer.unsubscribe("c1", id).await;
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn line_decoder_splits_across_frame_boundaries() {
        let mut decoder = LineDecoder::default();
        assert!(decoder.feed(FrameStream::Stdout, b"hello ").is_empty());
        let lines = decoder.feed(FrameStream::Stdout, b"world\nsecond\nthi");
        assert_eq!(lines, vec![(LogStream::Stdout, "hello world".to_owned()), (LogStream::Stdout, "second".to_owned())]);
    }
}
