//! Server-side event dispatcher fanning committed transitions out to
//! per-user push channels.
//!
//! The dispatcher is the only writer on the transport; everything else
//! subscribes. Publishing is synchronous, so events for the same task reach
//! every recipient's channel in commit order. Cross-task ordering is not
//! guaranteed.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::marketplace::{
    domain::{DomainEvent, UserId},
    ports::EventPublisher,
};

/// Default per-user channel capacity.
const DEFAULT_CAPACITY: usize = 64;

/// Push-event dispatcher with one broadcast channel per connected user.
///
/// A recipient without an open channel is skipped; offline clients catch up
/// through the sync layer's reconnect refresh rather than a server-side
/// queue.
#[derive(Debug)]
pub struct EventDispatcher {
    channels: RwLock<HashMap<UserId, broadcast::Sender<DomainEvent>>>,
    capacity: usize,
}

impl EventDispatcher {
    /// Creates a dispatcher with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a dispatcher with an explicit per-user channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Opens (or joins) the push channel for `user` and returns a receiver.
    ///
    /// Multiple receivers share one underlying channel per user; a receiver
    /// only observes events published after it subscribed.
    pub fn subscribe(&self, user: UserId) -> broadcast::Receiver<DomainEvent> {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(user)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Closes the push channel for `user`, dropping queued events.
    pub fn disconnect(&self, user: UserId) {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        channels.remove(&user);
    }

    /// Returns how many users currently hold an open channel.
    #[must_use]
    pub fn connected_users(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for EventDispatcher {
    fn publish(&self, event: DomainEvent) {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(
            kind = %event.kind(),
            task_id = %event.task_id(),
            recipients = event.recipients().len(),
            "dispatching domain event"
        );
        for user in event.recipients() {
            let Some(sender) = channels.get(user) else {
                tracing::trace!(user = %user, "recipient has no open channel");
                continue;
            };
            if sender.send(event.clone()).is_err() {
                tracing::trace!(user = %user, "recipient channel has no live receivers");
            }
        }
    }
}
