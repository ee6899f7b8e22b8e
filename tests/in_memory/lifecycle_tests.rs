//! Full lifecycle integration tests through the transition engine.

use super::helpers::Harness;
use mandi::marketplace::{
    domain::{BidStatus, EventKind, TaskStatus, TransitionError, UserId},
    ports::MarketplaceStore,
    services::EngineError,
};
use rstest::{fixture, rstest};

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn open_to_completed_walks_every_intermediate_status(harness: Harness) {
    let customer = UserId::new();
    let tasker = UserId::new();
    let task = harness.post_task(customer, 500).await;
    let bid = harness.place_bid(&task, tasker, 450).await;

    let assignment = harness
        .engine
        .accept_bid(bid.id(), customer)
        .await
        .expect("accept should succeed");
    assert_eq!(assignment.task.status(), TaskStatus::Assigned);

    let started = harness
        .engine
        .start_task(task.id(), tasker)
        .await
        .expect("start should succeed");
    assert_eq!(started.status(), TaskStatus::InProgress);

    let requested = harness
        .engine
        .request_completion(task.id(), tasker, "gate swings freely again")
        .await
        .expect("completion request should succeed");
    assert_eq!(requested.status(), TaskStatus::CompletionRequested);

    let completed = harness
        .engine
        .confirm_completion(task.id(), customer, None)
        .await
        .expect("confirmation should succeed");
    assert_eq!(completed.status(), TaskStatus::Completed);
    assert!(completed.completed_at().is_some());

    // Server truth matches the returned snapshots at every step.
    let stored = harness
        .store
        .find_task(task.id())
        .await
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(stored, completed);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn events_for_one_task_arrive_in_commit_order(harness: Harness) {
    let customer = UserId::new();
    let tasker = UserId::new();
    let mut tasker_rx = harness.dispatcher.subscribe(tasker);

    let task = harness.post_task(customer, 500).await;
    let bid = harness.place_bid(&task, tasker, 450).await;
    harness
        .engine
        .accept_bid(bid.id(), customer)
        .await
        .expect("accept should succeed");
    harness
        .engine
        .start_task(task.id(), tasker)
        .await
        .expect("start should succeed");
    harness
        .engine
        .request_completion(task.id(), tasker, "done")
        .await
        .expect("completion request should succeed");

    let mut kinds = Vec::new();
    for _ in 0..4 {
        let event = tasker_rx.recv().await.expect("event should arrive");
        assert_eq!(event.task_id(), task.id());
        kinds.push(event.kind());
    }
    assert_eq!(
        kinds,
        vec![
            EventKind::BidPlaced,
            EventKind::BidStatusChanged,
            EventKind::TaskStatusChanged,
            EventKind::CompletionRequested,
        ]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_task_rejects_every_later_action(harness: Harness) {
    let customer = UserId::new();
    let tasker = UserId::new();
    let task = harness.post_task(customer, 500).await;
    let bid = harness.place_bid(&task, tasker, 450).await;

    harness
        .engine
        .cancel_task(task.id(), customer)
        .await
        .expect("cancel should succeed");

    let accept = harness.engine.accept_bid(bid.id(), customer).await;
    assert!(matches!(
        accept,
        Err(EngineError::Domain(TransitionError::InvalidTaskState {
            status: TaskStatus::Cancelled,
            ..
        }))
    ));

    let cancel_again = harness.engine.cancel_task(task.id(), customer).await;
    assert!(matches!(
        cancel_again,
        Err(EngineError::Domain(TransitionError::InvalidTaskState {
            status: TaskStatus::Cancelled,
            ..
        }))
    ));

    let stored_bid = harness
        .store
        .find_bid(bid.id())
        .await
        .expect("lookup should succeed")
        .expect("bid should exist");
    assert_eq!(stored_bid.status(), BidStatus::Cancelled);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn assignee_invariant_holds_at_every_step(harness: Harness) {
    let customer = UserId::new();
    let tasker = UserId::new();
    let task = harness.post_task(customer, 500).await;
    let bid = harness.place_bid(&task, tasker, 450).await;

    harness
        .engine
        .accept_bid(bid.id(), customer)
        .await
        .expect("accept should succeed");
    harness
        .engine
        .start_task(task.id(), tasker)
        .await
        .expect("start should succeed");
    harness
        .engine
        .request_completion(task.id(), tasker, "done")
        .await
        .expect("completion request should succeed");
    harness
        .engine
        .reject_completion(task.id(), customer, "latch still sticks")
        .await
        .expect("completion rejection should succeed");

    let stored = harness
        .store
        .find_task(task.id())
        .await
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(
        stored.status().requires_assignee(),
        stored.assigned_to().is_some()
    );
    assert_eq!(stored.assigned_to(), Some(tasker));
}
