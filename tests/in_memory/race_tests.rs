//! Concurrency tests for the single-writer-per-entity guarantee.

use super::helpers::Harness;
use mandi::marketplace::{
    domain::{BidStatus, TaskStatus, TransitionError, UserId},
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
async fn racing_accepts_yield_one_winner_and_one_typed_loser(harness: Harness) {
    let customer = UserId::new();
    let task = harness.post_task(customer, 500).await;

    let mut bid_ids = Vec::new();
    let mut bidders = Vec::new();
    for offer in [450_u64, 430, 410, 390] {
        let bidder = UserId::new();
        let bid = harness.place_bid(&task, bidder, offer).await;
        bid_ids.push(bid.id());
        bidders.push(bidder);
    }

    let mut handles = Vec::new();
    for bid_id in &bid_ids {
        let engine = harness.engine.clone();
        let bid_id = *bid_id;
        handles.push(tokio::spawn(async move {
            engine.accept_bid(bid_id, customer).await
        }));
    }

    let mut successes = 0_usize;
    for handle in handles {
        let result = handle.await.expect("accept task should not panic");
        match result {
            Ok(_) => successes += 1,
            Err(EngineError::Domain(
                TransitionError::ConflictingAccept(_)
                | TransitionError::InvalidTaskState { .. },
            )) => {}
            Err(other) => panic!("unexpected rejection: {other:?}"),
        }
    }
    assert_eq!(successes, 1, "exactly one accept must win the race");

    let stored = harness
        .store
        .find_task(task.id())
        .await
        .expect("lookup should succeed")
        .expect("task should exist");
    assert_eq!(stored.status(), TaskStatus::Assigned);
    let assignee = stored.assigned_to().expect("an assignee must be set");
    assert!(bidders.contains(&assignee));

    let bids = harness
        .store
        .bids_by_task(task.id())
        .await
        .expect("listing should succeed");
    let accepted = bids
        .iter()
        .filter(|bid| bid.status() == BidStatus::Accepted)
        .count();
    assert_eq!(accepted, 1, "mutual exclusion on accepted bids");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn racing_cancel_and_accept_agree_on_one_outcome(harness: Harness) {
    let customer = UserId::new();
    let tasker = UserId::new();
    let task = harness.post_task(customer, 500).await;
    let bid = harness.place_bid(&task, tasker, 450).await;

    let (accept, cancel) = tokio::join!(
        harness.engine.accept_bid(bid.id(), customer),
        harness.engine.cancel_task(task.id(), customer),
    );

    // Whichever write lands second loses its conditional update; the two
    // must never both succeed.
    assert!(accept.is_ok() != cancel.is_ok());

    let stored = harness
        .store
        .find_task(task.id())
        .await
        .expect("lookup should succeed")
        .expect("task should exist");
    let stored_bid = harness
        .store
        .find_bid(bid.id())
        .await
        .expect("lookup should succeed")
        .expect("bid should exist");
    if accept.is_ok() {
        assert_eq!(stored.status(), TaskStatus::Assigned);
        assert_eq!(stored_bid.status(), BidStatus::Accepted);
    } else {
        assert_eq!(stored.status(), TaskStatus::Cancelled);
        assert_eq!(stored_bid.status(), BidStatus::Cancelled);
    }
}
