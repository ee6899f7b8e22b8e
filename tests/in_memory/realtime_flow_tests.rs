//! End-to-end flow: engine commits propagate to two connected sessions.

use std::sync::Arc;
use std::time::Duration;

use super::helpers::Harness;
use mandi::marketplace::domain::{BidStatus, TaskStatus, UserId};
use mandi::realtime::config::SyncConfig;
use mandi::realtime::sync::{BidEntry, StoreFetchClient, SyncSession, TaskEntry};
use rstest::{fixture, rstest};

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

fn fast_config() -> SyncConfig {
    SyncConfig {
        reconcile_delay_ms: 5,
        fetch_timeout_ms: 100,
        fetch_retries: 1,
    }
}

/// Polls until `predicate` holds or the deadline passes.
async fn wait_until(mut predicate: impl FnMut() -> bool) {
    for _ in 0..100 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn customer_and_tasker_views_converge_after_accept(harness: Harness) {
    let customer = UserId::new();
    let tasker = UserId::new();
    let task = harness.post_task(customer, 500).await;

    let fetch = Arc::new(StoreFetchClient::new(Arc::clone(&harness.store)));
    let customer_session = SyncSession::new(customer, Arc::clone(&fetch), fast_config());
    customer_session.attach(harness.dispatcher.subscribe(customer));
    customer_session
        .views()
        .lock()
        .expect("views lock")
        .record_local_task(TaskEntry::from(&task));
    customer_session
        .views()
        .lock()
        .expect("views lock")
        .open_detail(TaskEntry::from(&task), Vec::new());

    let tasker_session = SyncSession::new(tasker, fetch, fast_config());
    tasker_session.attach(harness.dispatcher.subscribe(tasker));

    let bid = harness.place_bid(&task, tasker, 440).await;
    tasker_session
        .views()
        .lock()
        .expect("views lock")
        .record_local_bid(BidEntry::from(&bid));

    // The customer's open detail gains the bid row from the event alone.
    let customer_views = customer_session.views();
    wait_until(|| {
        customer_views
            .lock()
            .expect("views lock")
            .detail()
            .is_some_and(|detail| detail.bids.len() == 1)
    })
    .await;

    harness
        .engine
        .accept_bid(bid.id(), customer)
        .await
        .expect("accept should succeed");

    let tasker_views = tasker_session.views();
    wait_until(|| {
        tasker_views
            .lock()
            .expect("views lock")
            .my_bids()
            .first()
            .is_some_and(|entry| entry.status == BidStatus::Accepted)
    })
    .await;
    wait_until(|| {
        customer_views
            .lock()
            .expect("views lock")
            .my_tasks()
            .first()
            .is_some_and(|entry| entry.status == TaskStatus::Assigned)
    })
    .await;
    wait_until(|| {
        tasker_views
            .lock()
            .expect("views lock")
            .my_tasks()
            .iter()
            .any(|entry| entry.task_id == task.id())
    })
    .await;

    let customer_views = customer_views.lock().expect("views lock");
    assert_eq!(
        customer_views.my_tasks().first().map(|entry| entry.status),
        Some(TaskStatus::Assigned)
    );
    let tasker_views = tasker_views.lock().expect("views lock");
    assert_eq!(tasker_views.my_bids().len(), 1, "no duplicate bid entries");
    assert_eq!(
        tasker_views.my_bids().first().map(|entry| entry.status),
        Some(BidStatus::Accepted)
    );
    // The tasker's "my tasks" now lists the assigned task after reconcile.
    assert!(
        tasker_views
            .my_tasks()
            .iter()
            .any(|entry| entry.task_id == task.id())
    );
}
