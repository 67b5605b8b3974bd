//! App lifecycle event source

use tokio::sync::broadcast::{self, error::RecvError};

const CHANNEL_CAPACITY: usize = 16;

/// App moved between background and foreground
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Background,
    Foreground,
}

/// Broadcast source of lifecycle transitions.
///
/// Cloning shares the same channel; the event loop emits, observers
/// subscribe.
#[derive(Debug, Clone)]
pub struct LifecycleEvents {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Deliver an event to current subscribers. Events with no subscriber
    /// are dropped.
    pub fn emit(&self, event: LifecycleEvent) {
        if self.sender.send(event).is_err() {
            log::trace!("No lifecycle observers for {:?}", event);
        }
    }

    /// Start observing. Dropping the subscription unsubscribes.
    pub fn subscribe(&self) -> LifecycleSubscription {
        LifecycleSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LifecycleEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Live subscription to lifecycle events
#[derive(Debug)]
pub struct LifecycleSubscription {
    receiver: broadcast::Receiver<LifecycleEvent>,
}

impl LifecycleSubscription {
    /// Next event, or `None` once every source is gone
    pub async fn next(&mut self) -> Option<LifecycleEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Lifecycle observer lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
