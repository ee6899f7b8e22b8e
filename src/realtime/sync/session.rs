//! Per-session synchronization driver.
//!
//! One `SyncSession` exists per logged-in session. It owns the single
//! transport listener for that session, patches view state as events
//! arrive, fans events out to component subscriptions, and schedules the
//! reconciling fetches that converge views on server truth.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::reconcile::{FetchClient, Reconciler};
use super::subscriptions::{EventScope, SubscriptionId, SubscriptionRegistry};
use super::views::{SessionViews, ViewKind};
use crate::marketplace::domain::{DomainEvent, EventKind, UserId};
use crate::realtime::config::SyncConfig;

/// Synchronization driver for one connected session.
///
/// Event handling runs on the listener task and never blocks: view patches
/// and callback fan-out are synchronous and cheap, while every fetch runs
/// as an independently spawned task.
pub struct SyncSession<F>
where
    F: FetchClient + 'static,
{
    views: Arc<Mutex<SessionViews>>,
    reconciler: Reconciler<F>,
    registry: Arc<SubscriptionRegistry>,
    listener: Mutex<Option<JoinHandle<()>>>,
    weak_self: Weak<Self>,
}

impl<F> SyncSession<F>
where
    F: FetchClient + 'static,
{
    /// Creates a session for `user` over the given fetch client.
    #[must_use]
    pub fn new(user: UserId, client: Arc<F>, config: SyncConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            views: Arc::new(Mutex::new(SessionViews::new(user))),
            reconciler: Reconciler::new(client, config),
            registry: Arc::new(SubscriptionRegistry::new()),
            listener: Mutex::new(None),
            weak_self: weak_self.clone(),
        })
    }

    /// Returns the shared view state.
    #[must_use]
    pub fn views(&self) -> Arc<Mutex<SessionViews>> {
        Arc::clone(&self.views)
    }

    /// Returns the subscription registry.
    #[must_use]
    pub fn registry(&self) -> Arc<SubscriptionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Registers a component callback for (kind, scope).
    pub fn subscribe(
        &self,
        kind: EventKind,
        scope: EventScope,
        callback: impl Fn(&DomainEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.registry.subscribe(kind, scope, callback)
    }

    /// Removes a component callback.
    ///
    /// The shared transport listener is torn down only when this was the
    /// session's last subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.registry.unsubscribe(id);
        if removed && self.registry.is_empty() {
            self.detach();
        }
        removed
    }

    /// Starts (or replaces) the session's transport listener.
    pub fn attach(&self, mut receiver: broadcast::Receiver<DomainEvent>) {
        let weak = self.weak_self.clone();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        let Some(session) = weak.upgrade() else { break };
                        session.handle_event(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // An unknown number of events was missed; only a
                        // full refresh restores consistency.
                        tracing::warn!(skipped, "event stream lagged; refreshing all views");
                        let Some(session) = weak.upgrade() else { break };
                        session.resync();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        let mut listener = self.lock_listener();
        if let Some(previous) = listener.replace(handle) {
            previous.abort();
        }
    }

    /// Stops the session's transport listener, if running.
    pub fn detach(&self) {
        let mut listener = self.lock_listener();
        if let Some(handle) = listener.take() {
            handle.abort();
        }
    }

    /// Handles a transport reconnect after a drop.
    ///
    /// The session must assume it missed events while disconnected — the
    /// server queues nothing for offline clients — so every displayed view
    /// is refreshed rather than resuming the stream where it left off.
    pub fn on_reconnect(&self, receiver: broadcast::Receiver<DomainEvent>) {
        self.attach(receiver);
        self.resync();
    }

    /// Applies one event: patch views, fan out to subscribers, schedule
    /// reconciles for the affected views.
    pub fn handle_event(&self, event: &DomainEvent) {
        let affected = self.lock_views().apply_event(event);
        self.registry.deliver(event);
        for view in affected {
            self.schedule_reconcile(view);
        }
    }

    /// Refreshes every displayed view immediately.
    pub fn resync(&self) {
        let displayed = self.lock_views().displayed_views();
        for view in displayed {
            let Some(session) = self.weak_self.upgrade() else {
                return;
            };
            tokio::spawn(async move {
                session.reconciler.refresh(&session.views, view).await;
            });
        }
    }

    /// Schedules a delayed reconciling fetch for one view.
    fn schedule_reconcile(&self, view: ViewKind) {
        let Some(session) = self.weak_self.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(session.reconciler.config().reconcile_delay()).await;
            session.reconciler.refresh(&session.views, view).await;
        });
    }

    fn lock_views(&self) -> std::sync::MutexGuard<'_, SessionViews> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listener(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F> Drop for SyncSession<F>
where
    F: FetchClient + 'static,
{
    fn drop(&mut self) {
        self.detach();
    }
}
