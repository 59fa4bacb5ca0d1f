//! Refresh signal.
//!
//! A broadcast notification that lets one part of the client ask the
//! collection store to reload without holding a reference to it. The signal is
//! cloned into every publisher; the store subscribes through
//! [`CollectionStore::listen`](super::store::CollectionStore::listen).

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use tokio::sync::broadcast;
use tracing::debug;

const METRIC_REFRESH_PUBLISHED: &str = "postwall_refresh_published_total";
const DEFAULT_CAPACITY: usize = 16;

/// Events carried by the refresh signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshEvent {
    /// The post collection changed on the remote store.
    PostsUpdated,
}

/// Cloneable publisher/subscriber handle for [`RefreshEvent`]s.
#[derive(Clone)]
pub struct RefreshSignal {
    sender: broadcast::Sender<RefreshEvent>,
    published: Arc<AtomicU64>,
}

impl RefreshSignal {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let (sender, _) = broadcast::channel(capacity.get());
        Self {
            sender,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event. Returns how many subscribers will observe it.
    pub fn publish(&self, event: RefreshEvent) -> usize {
        let sequence = self.published.fetch_add(1, Ordering::SeqCst);
        counter!(METRIC_REFRESH_PUBLISHED).increment(1);

        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(?event, sequence, receivers, "Refresh signal published");
                receivers
            }
            Err(_) => {
                debug!(?event, sequence, "Refresh signal published without subscribers");
                0
            }
        }
    }

    pub fn posts_updated(&self) -> usize {
        self.publish(RefreshEvent::PostsUpdated)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.sender.subscribe()
    }

    /// Total events published through any clone of this signal.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RefreshSignal {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let signal = RefreshSignal::default();

        assert_eq!(signal.posts_updated(), 0);
        assert_eq!(signal.published(), 1);
    }

    #[test]
    fn clones_share_one_channel() {
        let signal = RefreshSignal::default();
        let publisher = signal.clone();
        let mut receiver = signal.subscribe();

        assert_eq!(publisher.posts_updated(), 1);
        assert_eq!(receiver.try_recv(), Ok(RefreshEvent::PostsUpdated));
        assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(signal.published(), 1);
    }

    #[test]
    fn every_subscriber_observes_each_event() {
        let signal = RefreshSignal::default();
        let mut first = signal.subscribe();
        let mut second = signal.subscribe();

        assert_eq!(signal.subscriber_count(), 2);
        assert_eq!(signal.posts_updated(), 2);
        assert_eq!(first.try_recv(), Ok(RefreshEvent::PostsUpdated));
        assert_eq!(second.try_recv(), Ok(RefreshEvent::PostsUpdated));
    }

    #[test]
    fn slow_subscribers_observe_lag_instead_of_blocking() {
        let signal = RefreshSignal::new(NonZeroUsize::MIN);
        let mut receiver = signal.subscribe();

        signal.posts_updated();
        signal.posts_updated();
        signal.posts_updated();

        assert_eq!(receiver.try_recv(), Err(TryRecvError::Lagged(2)));
        assert_eq!(receiver.try_recv(), Ok(RefreshEvent::PostsUpdated));
    }
}
