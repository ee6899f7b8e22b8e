//! Typed subscription registry for component-level event interest.
//!
//! Components register callbacks keyed by (event kind, scope) instead of
//! installing global refresh functions. All subscriptions for a session
//! share one underlying transport listener; the registry fans a delivered
//! event out to every matching callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::marketplace::domain::{DomainEvent, EventKind, TaskId, UserId};

/// What a subscription is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventScope {
    /// Events concerning one specific task.
    Task(TaskId),
    /// Events addressed to one user, whatever the task.
    User(UserId),
}

impl EventScope {
    /// Returns whether the event falls inside this scope.
    #[must_use]
    pub fn matches(&self, event: &DomainEvent) -> bool {
        match self {
            Self::Task(task_id) => event.task_id() == *task_id,
            Self::User(user) => event.notifies(*user),
        }
    }
}

/// Handle identifying one registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&DomainEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    scope: EventScope,
    callback: Callback,
}

/// Registry fanning one event stream out to typed subscribers.
///
/// Callbacks run on the delivering task and must not block; schedule any
/// follow-up work (fetches in particular) as independent async tasks.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: Mutex<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for events of `kind` within `scope`.
    pub fn subscribe(
        &self,
        kind: EventKind,
        scope: EventScope,
        callback: impl Fn(&DomainEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subscriptions = self.lock();
        subscriptions.push(Subscription {
            id,
            kind,
            scope,
            callback: Arc::new(callback),
        });
        tracing::trace!(kind = %kind, "subscription registered");
        id
    }

    /// Removes a callback; returns whether it was registered.
    ///
    /// Removing one callback never tears down the shared listener; the
    /// session does that only when its last subscription goes away.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.lock();
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.id != id);
        subscriptions.len() != before
    }

    /// Returns how many callbacks are registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Invokes every callback whose (kind, scope) matches the event.
    ///
    /// Returns how many callbacks ran. Callbacks are invoked outside the
    /// registry lock, so a callback may subscribe or unsubscribe.
    pub fn deliver(&self, event: &DomainEvent) -> usize {
        let matching: Vec<Callback> = {
            let subscriptions = self.lock();
            subscriptions
                .iter()
                .filter(|subscription| {
                    subscription.kind == event.kind() && subscription.scope.matches(event)
                })
                .map(|subscription| Arc::clone(&subscription.callback))
                .collect()
        };
        for callback in &matching {
            callback(event);
        }
        matching.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscriptions", &self.len())
            .finish()
    }
}
