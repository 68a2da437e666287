//! One-shot notification capability and its broadcast-backed implementation.

use thiserror::Error;
use tokio::sync::{broadcast, oneshot};

use super::events::{ChangeNotice, WatchFilter};

/// Registration failure reported by a notification source.
#[derive(Debug, Clone, Error)]
pub enum WatchError {
    /// The source no longer accepts registrations.
    #[error("notification source is closed")]
    SourceClosed,
    /// Any other registration failure.
    #[error("{0}")]
    Message(String),
}

/// Capability to watch a row filter for one change.
///
/// Each successful [`watch`](NotificationSource::watch) call delivers at most
/// one notice on the returned receiver and then expires. Observers wanting a
/// continuous feed must re-register after every delivery; see
/// [`crate::listener::ChangeListener`]. Dropping the receiver cancels the
/// registration.
pub trait NotificationSource: Send + Sync + 'static {
    /// Registers a one-shot watch for changes matching `filter`.
    fn watch(&self, filter: &WatchFilter) -> Result<oneshot::Receiver<ChangeNotice>, WatchError>;
}

/// [`NotificationSource`] fed by a tokio broadcast channel.
///
/// Used by [`crate::store::sqlite::SqliteButtonStore::notifier`] and by tests
/// and embedders with their own change feeds. Each watch subscribes a fresh
/// broadcast receiver and forwards the first matching notice, preserving the
/// one-shot contract.
pub struct ChannelNotificationSource {
    tx: broadcast::Sender<ChangeNotice>,
}

impl ChannelNotificationSource {
    /// Creates a source with its own feed of the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Wraps an existing feed sender.
    pub fn from_sender(tx: broadcast::Sender<ChangeNotice>) -> Self {
        Self { tx }
    }

    /// Publishes `notice` to every outstanding watch. Lossy when no watch is
    /// registered.
    pub fn publish(&self, notice: ChangeNotice) {
        let _ = self.tx.send(notice);
    }

    /// Clones the underlying feed sender for external publishers.
    pub fn sender(&self) -> broadcast::Sender<ChangeNotice> {
        self.tx.clone()
    }
}

impl NotificationSource for ChannelNotificationSource {
    /// Must be called within a tokio runtime; the forwarding task is spawned
    /// on it.
    fn watch(&self, filter: &WatchFilter) -> Result<oneshot::Receiver<ChangeNotice>, WatchError> {
        let mut feed = self.tx.subscribe();
        let (done_tx, done_rx) = oneshot::channel();
        let filter = filter.clone();

        tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(notice) if filter.matches(&notice) => {
                        let _ = done_tx.send(notice);
                        return;
                    }
                    Ok(_) => {}
                    // Lagged watchers skip ahead; only a closed feed ends the
                    // registration without a delivery.
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Ok(done_rx)
    }
}
