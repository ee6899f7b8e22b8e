//! Reconciling fetch tests: convergence, retry budget, and timeouts.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use mockable::DefaultClock;

use super::{open_task, pending_bid};
use crate::marketplace::{
    adapters::memory::InMemoryMarketplaceStore,
    domain::{Bid, Task, TaskId, UserId},
    ports::MarketplaceStore,
};
use crate::realtime::config::SyncConfig;
use crate::realtime::sync::{
    FetchClient, FetchError, Reconciler, SessionViews, StoreFetchClient, TaskEntry, ViewKind,
};

fn test_config() -> SyncConfig {
    SyncConfig {
        reconcile_delay_ms: 5,
        fetch_timeout_ms: 50,
        fetch_retries: 2,
    }
}

fn shared_views(user: UserId) -> Arc<Mutex<SessionViews>> {
    Arc::new(Mutex::new(SessionViews::new(user)))
}

#[tokio::test(flavor = "multi_thread")]
async fn store_fetch_client_merges_posted_and_assigned_tasks() {
    let clock = DefaultClock;
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let customer = UserId::new();

    // One task posted by the user, one assigned to them.
    let own = open_task(customer, 500).expect("task should build");
    store.insert_task(&own).await.expect("insert should succeed");
    let mut assigned = open_task(UserId::new(), 700).expect("task should build");
    let poster = assigned.customer();
    let bid = pending_bid(&assigned, customer, 600).expect("bid should build");
    store
        .insert_task(&assigned)
        .await
        .expect("insert should succeed");
    store.insert_bid(&bid).await.expect("insert should succeed");
    assigned.assign(poster, &bid, &clock).expect("guards pass");
    let mut accepted = bid;
    accepted.accept(&clock).expect("guards pass");
    store
        .commit_assignment(&assigned, &accepted)
        .await
        .expect("commit should succeed");

    let client = StoreFetchClient::new(store);
    let tasks = client.my_tasks(customer).await.expect("fetch should succeed");
    assert_eq!(tasks.len(), 2);

    let bids = client.my_bids(customer).await.expect("fetch should succeed");
    assert_eq!(bids.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn refresh_replaces_view_and_clears_staleness() {
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let customer = UserId::new();
    let task = open_task(customer, 500).expect("task should build");
    store.insert_task(&task).await.expect("insert should succeed");

    let reconciler = Reconciler::new(Arc::new(StoreFetchClient::new(store)), test_config());
    let views = shared_views(customer);
    views
        .lock()
        .expect("views lock")
        .mark_stale(ViewKind::MyTasks);

    reconciler.refresh(&views, ViewKind::MyTasks).await;

    let views = views.lock().expect("views lock");
    assert_eq!(views.my_tasks().len(), 1);
    assert!(!views.is_stale(ViewKind::MyTasks));
}

#[tokio::test(flavor = "multi_thread")]
async fn refresh_of_closed_detail_is_a_no_op() {
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let customer = UserId::new();
    let reconciler = Reconciler::new(Arc::new(StoreFetchClient::new(store)), test_config());
    let views = shared_views(customer);

    reconciler.refresh(&views, ViewKind::TaskDetail).await;
    assert!(views.lock().expect("views lock").detail().is_none());
}

/// Client whose every fetch fails, counting attempts.
struct FailingClient {
    attempts: AtomicU32,
}

#[async_trait]
impl FetchClient for FailingClient {
    async fn my_tasks(&self, _user: UserId) -> Result<Vec<Task>, FetchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::Transport("listing endpoint down".to_owned()))
    }

    async fn my_bids(&self, _user: UserId) -> Result<Vec<Bid>, FetchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::Transport("listing endpoint down".to_owned()))
    }

    async fn task_detail(&self, _task_id: TaskId) -> Result<(Task, Vec<Bid>), FetchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::Transport("listing endpoint down".to_owned()))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_retries_mark_the_view_stale() {
    let client = Arc::new(FailingClient {
        attempts: AtomicU32::new(0),
    });
    let reconciler = Reconciler::new(Arc::clone(&client), test_config());
    let views = shared_views(UserId::new());

    reconciler.refresh(&views, ViewKind::MyBids).await;

    // One initial attempt plus the configured retries.
    assert_eq!(client.attempts.load(Ordering::SeqCst), 3);
    assert!(views.lock().expect("views lock").is_stale(ViewKind::MyBids));
}

/// Client that never completes, to exercise the timeout bound.
struct StalledClient;

#[async_trait]
impl FetchClient for StalledClient {
    async fn my_tasks(&self, _user: UserId) -> Result<Vec<Task>, FetchError> {
        std::future::pending::<()>().await;
        Ok(Vec::new())
    }

    async fn my_bids(&self, _user: UserId) -> Result<Vec<Bid>, FetchError> {
        std::future::pending::<()>().await;
        Ok(Vec::new())
    }

    async fn task_detail(&self, _task_id: TaskId) -> Result<(Task, Vec<Bid>), FetchError> {
        std::future::pending::<()>().await;
        Err(FetchError::Timeout)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stalled_fetches_hit_the_timeout_and_go_stale() {
    let config = SyncConfig {
        reconcile_delay_ms: 1,
        fetch_timeout_ms: 10,
        fetch_retries: 0,
    };
    let reconciler = Reconciler::new(Arc::new(StalledClient), config);
    let views = shared_views(UserId::new());

    reconciler.refresh(&views, ViewKind::MyTasks).await;
    assert!(views.lock().expect("views lock").is_stale(ViewKind::MyTasks));
}

#[tokio::test(flavor = "multi_thread")]
async fn detail_refresh_converges_on_server_truth() {
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let customer = UserId::new();
    let tasker = UserId::new();
    let task = open_task(customer, 500).expect("task should build");
    store.insert_task(&task).await.expect("insert should succeed");
    let bid = pending_bid(&task, tasker, 450).expect("bid should build");
    store.insert_bid(&bid).await.expect("insert should succeed");

    let reconciler = Reconciler::new(
        Arc::new(StoreFetchClient::new(Arc::clone(&store))),
        test_config(),
    );
    let views = shared_views(customer);
    views
        .lock()
        .expect("views lock")
        .open_detail(TaskEntry::from(&task), Vec::new());

    reconciler.refresh(&views, ViewKind::TaskDetail).await;

    let views = views.lock().expect("views lock");
    let detail = views.detail().expect("detail should be open");
    assert_eq!(detail.bids.len(), 1);
    assert_eq!(detail.bids.first().map(|entry| entry.bid_id), Some(bid.id()));
}
