//! Reconciling fetches that converge views on authoritative state.
//!
//! Event payloads are hints; the reconciler re-reads server truth after a
//! short delay, bounded by a timeout and a retry budget. Fetch failures are
//! swallowed — the view is flagged stale rather than surfacing an error.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

use super::views::{SessionViews, ViewKind};
use crate::marketplace::{
    domain::{Bid, Task, TaskId, UserId},
    ports::MarketplaceStore,
};
use crate::realtime::config::SyncConfig;

/// Errors surfaced by fetch clients.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The fetch did not complete inside the configured timeout.
    #[error("fetch timed out")]
    Timeout,

    /// The backend rejected or failed the fetch.
    #[error("fetch failed: {0}")]
    Transport(String),
}

/// Read-side contract supplying authoritative view state.
#[async_trait]
pub trait FetchClient: Send + Sync {
    /// Fetches the tasks the user posted or was assigned.
    async fn my_tasks(&self, user: UserId) -> Result<Vec<Task>, FetchError>;

    /// Fetches the bids the user placed.
    async fn my_bids(&self, user: UserId) -> Result<Vec<Bid>, FetchError>;

    /// Fetches one task and its bid list.
    async fn task_detail(&self, task_id: TaskId) -> Result<(Task, Vec<Bid>), FetchError>;
}

/// Fetch client reading straight from a marketplace store.
#[derive(Debug, Clone)]
pub struct StoreFetchClient<S>
where
    S: MarketplaceStore,
{
    store: Arc<S>,
}

impl<S> StoreFetchClient<S>
where
    S: MarketplaceStore,
{
    /// Creates a fetch client over the given store.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S> FetchClient for StoreFetchClient<S>
where
    S: MarketplaceStore,
{
    async fn my_tasks(&self, user: UserId) -> Result<Vec<Task>, FetchError> {
        let mut tasks = self
            .store
            .tasks_by_customer(user)
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        let assigned = self
            .store
            .tasks_assigned_to(user)
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        for task in assigned {
            if !tasks.iter().any(|existing| existing.id() == task.id()) {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    async fn my_bids(&self, user: UserId) -> Result<Vec<Bid>, FetchError> {
        self.store
            .bids_by_bidder(user)
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))
    }

    async fn task_detail(&self, task_id: TaskId) -> Result<(Task, Vec<Bid>), FetchError> {
        let task = self
            .store
            .find_task(task_id)
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?
            .ok_or_else(|| FetchError::Transport(format!("task not found: {task_id}")))?;
        let bids = self
            .store
            .bids_by_task(task_id)
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        Ok((task, bids))
    }
}

/// Converges one view on server truth, within a timeout and retry budget.
#[derive(Debug, Clone)]
pub struct Reconciler<F>
where
    F: FetchClient,
{
    client: Arc<F>,
    config: SyncConfig,
}

impl<F> Reconciler<F>
where
    F: FetchClient,
{
    /// Creates a reconciler over the given fetch client.
    #[must_use]
    pub const fn new(client: Arc<F>, config: SyncConfig) -> Self {
        Self { client, config }
    }

    /// Returns the synchronization configuration.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Refreshes one view from the server.
    ///
    /// Every attempt is bounded by the configured timeout; once the retry
    /// budget is exhausted the view is flagged stale and the failure is
    /// swallowed.
    pub async fn refresh(&self, views: &Arc<Mutex<SessionViews>>, view: ViewKind) {
        let mut attempts = 0_u32;
        loop {
            match self.fetch_once(views, view).await {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!(view = ?view, attempt = attempts, error = %err, "reconciling fetch failed");
                    if attempts >= self.config.fetch_retries {
                        lock_views(views).mark_stale(view);
                        return;
                    }
                    attempts += 1;
                }
            }
        }
    }

    async fn fetch_once(
        &self,
        views: &Arc<Mutex<SessionViews>>,
        view: ViewKind,
    ) -> Result<(), FetchError> {
        let user = lock_views(views).user();
        match view {
            ViewKind::MyTasks => {
                let tasks = self.bounded(self.client.my_tasks(user)).await?;
                lock_views(views).replace_my_tasks(&tasks);
            }
            ViewKind::MyBids => {
                let bids = self.bounded(self.client.my_bids(user)).await?;
                lock_views(views).replace_my_bids(&bids);
            }
            ViewKind::TaskDetail => {
                let Some(task_id) = lock_views(views).detail_task_id() else {
                    // Detail closed since the reconcile was scheduled.
                    return Ok(());
                };
                let (task, bids) = self.bounded(self.client.task_detail(task_id)).await?;
                lock_views(views).replace_detail(&task, &bids);
            }
        }
        Ok(())
    }

    async fn bounded<T>(
        &self,
        fetch: impl std::future::Future<Output = Result<T, FetchError>> + Send,
    ) -> Result<T, FetchError> {
        tokio::time::timeout(self.config.fetch_timeout(), fetch)
            .await
            .map_err(|_elapsed| FetchError::Timeout)?
    }
}

/// Locks the shared views, recovering from poisoning.
fn lock_views(views: &Arc<Mutex<SessionViews>>) -> std::sync::MutexGuard<'_, SessionViews> {
    views.lock().unwrap_or_else(PoisonError::into_inner)
}
