use std::{collections::BTreeMap, sync::Arc, time::Duration};

use matchday_feed::UpdateFeed;
use matchday_types::{events::TrackerNotice, Result};
use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{debug, warn};

use crate::{store_error, KeyValueStore};

enum WriteCommand {
    Save {
        key: String,
        value: Value,
        critical: bool,
    },
    Remove {
        key: String,
    },
    Flush {
        done: oneshot::Sender<Result<()>>,
    },
}

enum PendingWrite {
    Save(Value),
    Remove,
}

/// Fire-and-forget writer in front of a [`KeyValueStore`].
///
/// Ordinary saves are coalesced per key and written once no new save has
/// arrived for `delay`. Critical saves and removals flush everything queued
/// straight away. Failed writes are reported on the feed and returned by the
/// next [`flush`](Self::flush); they are not retried.
pub struct PersistenceWriter {
    tx: mpsc::UnboundedSender<WriteCommand>,
    handle: JoinHandle<()>,
}

impl PersistenceWriter {
    pub fn spawn(store: Arc<dyn KeyValueStore>, delay: Duration, feed: Arc<dyn UpdateFeed>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(store, delay, feed, rx));
        Self { tx, handle }
    }

    pub fn save(&self, key: &str, value: Value) -> Result<()> {
        self.send(WriteCommand::Save {
            key: key.to_string(),
            value,
            critical: false,
        })
    }

    pub fn save_now(&self, key: &str, value: Value) -> Result<()> {
        self.send(WriteCommand::Save {
            key: key.to_string(),
            value,
            critical: true,
        })
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.send(WriteCommand::Remove {
            key: key.to_string(),
        })
    }

    /// Writes everything queued and reports the first failure since the
    /// previous flush.
    pub async fn flush(&self) -> Result<()> {
        let (done, result) = oneshot::channel();
        self.send(WriteCommand::Flush { done })?;
        result
            .await
            .map_err(|_| store_error("persistence writer stopped before flushing"))?
    }

    pub async fn shutdown(self) -> Result<()> {
        let result = self.flush().await;
        drop(self.tx);
        self.handle
            .await
            .map_err(|err| store_error(format!("persistence writer panicked: {err}")))?;
        result
    }

    fn send(&self, command: WriteCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| store_error("persistence writer is not running"))
    }
}

async fn run_writer(
    store: Arc<dyn KeyValueStore>,
    delay: Duration,
    feed: Arc<dyn UpdateFeed>,
    mut rx: mpsc::UnboundedReceiver<WriteCommand>,
) {
    let mut pending: BTreeMap<String, PendingWrite> = BTreeMap::new();
    let mut deadline: Option<Instant> = None;
    let mut first_failure: Option<String> = None;

    loop {
        let command = match deadline {
            Some(at) => tokio::select! {
                command = rx.recv() => command,
                _ = sleep_until(at) => {
                    deadline = None;
                    write_pending(store.as_ref(), feed.as_ref(), &mut pending, &mut first_failure).await;
                    continue;
                }
            },
            None => rx.recv().await,
        };

        let Some(command) = command else {
            write_pending(store.as_ref(), feed.as_ref(), &mut pending, &mut first_failure).await;
            debug!("Persistence writer stopped");
            break;
        };

        match command {
            WriteCommand::Save {
                key,
                value,
                critical,
            } => {
                pending.insert(key, PendingWrite::Save(value));
                if critical {
                    deadline = None;
                    write_pending(store.as_ref(), feed.as_ref(), &mut pending, &mut first_failure)
                        .await;
                } else {
                    deadline = Some(Instant::now() + delay);
                }
            }
            WriteCommand::Remove { key } => {
                pending.insert(key, PendingWrite::Remove);
                deadline = None;
                write_pending(store.as_ref(), feed.as_ref(), &mut pending, &mut first_failure).await;
            }
            WriteCommand::Flush { done } => {
                deadline = None;
                write_pending(store.as_ref(), feed.as_ref(), &mut pending, &mut first_failure).await;
                let result = match first_failure.take() {
                    Some(message) => Err(store_error(message)),
                    None => Ok(()),
                };
                let _ = done.send(result);
            }
        }
    }
}

async fn write_pending(
    store: &dyn KeyValueStore,
    feed: &dyn UpdateFeed,
    pending: &mut BTreeMap<String, PendingWrite>,
    first_failure: &mut Option<String>,
) {
    for (key, write) in std::mem::take(pending) {
        let outcome = match &write {
            PendingWrite::Save(value) => store.save(&key, value).await,
            PendingWrite::Remove => store.remove(&key).await,
        };
        match outcome {
            Ok(()) => debug!("Persisted '{}'", key),
            Err(err) => {
                warn!("Failed to persist '{}': {}", key, err);
                let message = err.to_string();
                if let Err(feed_err) = feed.publish(TrackerNotice::persistence_failed(&key, &message)) {
                    warn!("Could not report persistence failure: {}", feed_err);
                }
                first_failure.get_or_insert(message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use futures::StreamExt;
    use matchday_feed::{LocalFeed, NullFeed};
    use matchday_types::events::{NoticeKind, NoticePayload};
    use serde_json::json;

    fn writer(store: &Arc<MemoryStore>, delay_ms: u64) -> PersistenceWriter {
        PersistenceWriter::spawn(store.clone(), Duration::from_millis(delay_ms), Arc::new(NullFeed))
    }

    #[tokio::test(start_paused = true)]
    async fn saves_are_coalesced_until_idle() {
        let store = Arc::new(MemoryStore::new());
        let writer = writer(&store, 400);

        writer.save("k", json!(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        writer.save("k", json!(2)).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.load("k").await.unwrap(), None);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.load("k").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn critical_saves_skip_the_delay() {
        let store = Arc::new(MemoryStore::new());
        let writer = writer(&store, 10_000);

        writer.save("other", json!("queued")).unwrap();
        writer.save_now("k", json!(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.get("k"), Some(&json!(1)));
        assert_eq!(snapshot.get("other"), Some(&json!("queued")));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_and_shutdown_write_everything() {
        let store = Arc::new(MemoryStore::new());
        let writer = writer(&store, 10_000);
        writer.save("a", json!(1)).unwrap();
        writer.flush().await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), Some(json!(1)));

        writer.save("b", json!(2)).unwrap();
        writer.remove("a").unwrap();
        writer.shutdown().await.unwrap();
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.get("a"), None);
        assert_eq!(snapshot.get("b"), Some(&json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_reported_on_feed_and_next_flush() {
        let store = Arc::new(MemoryStore::new());
        let feed = Arc::new(LocalFeed::new(8));
        let mut notices = feed.subscribe();
        let writer = PersistenceWriter::spawn(store.clone(), Duration::from_millis(50), feed);

        store.set_failing(true);
        writer.save_now("k", json!(1)).unwrap();
        let notice = notices.next().await.expect("failure notice");
        assert_eq!(notice.kind, NoticeKind::Persistence);
        assert!(matches!(notice.payload, NoticePayload::Persistence(ref p) if p.key == "k"));

        assert!(writer.flush().await.is_err());
        assert!(writer.flush().await.is_ok());

        store.set_failing(false);
        writer.save_now("k", json!(2)).unwrap();
        writer.flush().await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), Some(json!(2)));
    }
}
