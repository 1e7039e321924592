//! Update feed from the tracker to the presentation layer.

use std::sync::{Arc, RwLock};

use futures::{stream::BoxStream, StreamExt};
use matchday_types::{events::TrackerNotice, MatchdayError, Result};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// Sink for tracker notices. Publishing never blocks, so it can be called
/// from inside a synchronous mutation.
pub trait UpdateFeed: Send + Sync {
    fn publish(&self, notice: TrackerNotice) -> Result<()>;
    fn subscribe(&self) -> BoxStream<'static, TrackerNotice>;

    /// Ends every subscription. Later publishes fail.
    fn close(&self) {}
}

/// In-process feed backed by a broadcast channel. Clones share the channel.
#[derive(Clone)]
pub struct LocalFeed {
    tx: Arc<RwLock<Option<broadcast::Sender<TrackerNotice>>>>,
}

impl LocalFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx: Arc::new(RwLock::new(Some(tx))),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender()
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.sender().is_err()
    }

    fn sender(&self) -> Result<broadcast::Sender<TrackerNotice>> {
        let guard = self
            .tx
            .read()
            .map_err(|_| feed_error("feed lock poisoned"))?;
        guard.clone().ok_or_else(|| feed_error("feed is closed"))
    }
}

impl UpdateFeed for LocalFeed {
    /// Notices sent with nobody listening are dropped.
    fn publish(&self, notice: TrackerNotice) -> Result<()> {
        match self.sender()?.send(notice) {
            Ok(receivers) => debug!("Notice delivered to {} subscriber(s)", receivers),
            Err(_) => debug!("Notice dropped: no subscribers"),
        }
        Ok(())
    }

    /// Lagging subscribers skip the notices they missed. A closed feed
    /// yields an empty stream.
    fn subscribe(&self) -> BoxStream<'static, TrackerNotice> {
        let Ok(tx) = self.sender() else {
            return futures::stream::empty().boxed();
        };
        BroadcastStream::new(tx.subscribe())
            .filter_map(|notice| async move {
                match notice {
                    Ok(notice) => Some(notice),
                    Err(err) => {
                        warn!("Feed subscriber lagged: {}", err);
                        None
                    }
                }
            })
            .boxed()
    }

    fn close(&self) {
        match self.tx.write() {
            Ok(mut guard) => {
                if guard.take().is_some() {
                    debug!("Feed closed");
                }
            }
            Err(_) => warn!("Feed lock poisoned; not closed"),
        }
    }
}

pub fn feed_error(message: impl Into<String>) -> MatchdayError {
    MatchdayError::Feed(message.into())
}

/// Feed that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFeed;

impl UpdateFeed for NullFeed {
    fn publish(&self, _notice: TrackerNotice) -> Result<()> {
        Ok(())
    }

    fn subscribe(&self) -> BoxStream<'static, TrackerNotice> {
        futures::stream::empty().boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchday_types::events::{LifecyclePhase, NoticeKind};

    #[tokio::test]
    async fn subscribers_receive_published_notices() {
        let feed = LocalFeed::new(8);
        let mut stream = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        feed.publish(TrackerNotice::lifecycle(LifecyclePhase::NewMatch, None))
            .unwrap();
        let notice = stream.next().await.expect("notice");
        assert_eq!(notice.kind, NoticeKind::Lifecycle);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let feed = LocalFeed::new(4);
        assert!(feed
            .publish(TrackerNotice::persistence_failed("matchRecord", "disk full"))
            .is_ok());
        assert!(NullFeed.subscribe().next().await.is_none());
    }

    #[tokio::test]
    async fn closing_ends_subscriptions_and_rejects_publishes() {
        let feed = LocalFeed::new(4);
        let mut stream = feed.subscribe();
        let clone = feed.clone();

        clone.close();
        assert!(feed.is_closed());
        assert!(stream.next().await.is_none());
        assert!(matches!(
            feed.publish(TrackerNotice::lifecycle(LifecyclePhase::Shutdown, None)),
            Err(MatchdayError::Feed(_))
        ));
        assert_eq!(feed.subscriber_count(), 0);
        assert!(feed.subscribe().next().await.is_none());
    }
}
