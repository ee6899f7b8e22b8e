//! Unit tests for the bid aggregate and amount validation.

use super::open_task;
use crate::marketplace::domain::{
    Action, Amount, Bid, BidStatus, TaskStatus, TransitionError, UserId, ValidationError,
};
use eyre::{bail, ensure};
use mockable::DefaultClock;
use rstest::{fixture, rstest};

#[fixture]
fn clock() -> DefaultClock {
    DefaultClock
}

#[rstest]
#[case(BidStatus::Pending, false)]
#[case(BidStatus::Accepted, true)]
#[case(BidStatus::Rejected, true)]
#[case(BidStatus::Cancelled, true)]
fn is_terminal_returns_expected(#[case] status: BidStatus, #[case] expected: bool) {
    assert_eq!(status.is_terminal(), expected);
}

#[rstest]
fn status_round_trips_through_wire_form() -> eyre::Result<()> {
    for status in [
        BidStatus::Pending,
        BidStatus::Accepted,
        BidStatus::Rejected,
        BidStatus::Cancelled,
    ] {
        let parsed = BidStatus::try_from(status.as_str())
            .map_err(|err| eyre::eyre!("round trip failed: {err}"))?;
        ensure!(parsed == status);
    }
    Ok(())
}

#[rstest]
#[case(0)]
fn zero_amount_is_rejected(#[case] value: u64) {
    assert_eq!(
        Amount::new(value),
        Err(ValidationError::NonPositiveAmount)
    );
}

#[rstest]
fn oversized_amount_is_rejected() {
    let value = u64::MAX;
    assert_eq!(
        Amount::new(value),
        Err(ValidationError::AmountOutOfRange(value))
    );
}

#[rstest]
fn place_creates_pending_bid(clock: DefaultClock) -> eyre::Result<()> {
    let customer = UserId::new();
    let tasker = UserId::new();
    let task = open_task(customer, 500)?;

    let bid = Bid::place(&task, tasker, Amount::new(450)?, "Can start today", &clock)?
        .with_estimated_days(2);

    ensure!(bid.task_id() == task.id());
    ensure!(bid.bidder() == tasker);
    ensure!(bid.status() == BidStatus::Pending);
    ensure!(bid.amount() == Amount::new(450)?);
    ensure!(bid.estimated_days() == Some(2));
    ensure!(bid.rejection_reason().is_none());
    Ok(())
}

#[rstest]
fn customer_cannot_bid_on_own_task(clock: DefaultClock) -> eyre::Result<()> {
    let customer = UserId::new();
    let task = open_task(customer, 500)?;

    let result = Bid::place(&task, customer, Amount::new(450)?, "myself", &clock);
    if !matches!(
        result,
        Err(TransitionError::Unauthorized {
            action: Action::PlaceBid,
            ..
        })
    ) {
        bail!("expected Unauthorized, got {result:?}");
    }
    Ok(())
}

#[rstest]
fn bidding_on_assigned_task_is_rejected(clock: DefaultClock) -> eyre::Result<()> {
    let customer = UserId::new();
    let first_tasker = UserId::new();
    let late_tasker = UserId::new();
    let mut task = open_task(customer, 500)?;
    let bid = Bid::place(&task, first_tasker, Amount::new(450)?, "first", &clock)?;
    task.assign(customer, &bid, &clock)?;

    let result = Bid::place(&task, late_tasker, Amount::new(300)?, "late", &clock);
    let expected_status = TaskStatus::Assigned;
    if !matches!(
        result,
        Err(TransitionError::InvalidTaskState { status, .. }) if status == expected_status
    ) {
        bail!("expected InvalidTaskState, got {result:?}");
    }
    Ok(())
}

#[rstest]
fn resubmit_updates_amount_and_message(clock: DefaultClock) -> eyre::Result<()> {
    let customer = UserId::new();
    let tasker = UserId::new();
    let task = open_task(customer, 500)?;
    let mut bid = Bid::place(&task, tasker, Amount::new(450)?, "original offer", &clock)?;
    let original_id = bid.id();

    bid.resubmit(Amount::new(420)?, "lowered offer", Some(3), &clock)?;

    ensure!(bid.id() == original_id);
    ensure!(bid.amount() == Amount::new(420)?);
    ensure!(bid.message() == "lowered offer");
    ensure!(bid.estimated_days() == Some(3));
    ensure!(bid.status() == BidStatus::Pending);
    Ok(())
}

#[rstest]
fn resubmit_after_rejection_is_rejected(clock: DefaultClock) -> eyre::Result<()> {
    let customer = UserId::new();
    let tasker = UserId::new();
    let task = open_task(customer, 500)?;
    let mut bid = Bid::place(&task, tasker, Amount::new(450)?, "offer", &clock)?;
    bid.reject(Some("too expensive".to_owned()), &clock)?;

    let result = bid.resubmit(Amount::new(400)?, "again", None, &clock);
    let expected = Err(TransitionError::InvalidBidState {
        bid_id: bid.id(),
        status: BidStatus::Rejected,
        action: Action::PlaceBid,
    });
    if result != expected {
        bail!("expected {expected:?}, got {result:?}");
    }
    Ok(())
}

#[rstest]
fn reject_stores_optional_reason(clock: DefaultClock) -> eyre::Result<()> {
    let customer = UserId::new();
    let tasker = UserId::new();
    let task = open_task(customer, 500)?;
    let mut bid = Bid::place(&task, tasker, Amount::new(450)?, "offer", &clock)?;

    bid.reject(Some("found someone closer".to_owned()), &clock)?;
    ensure!(bid.status() == BidStatus::Rejected);
    ensure!(bid.rejection_reason() == Some("found someone closer"));
    Ok(())
}

#[rstest]
fn reject_without_reason_is_allowed(clock: DefaultClock) -> eyre::Result<()> {
    let customer = UserId::new();
    let tasker = UserId::new();
    let task = open_task(customer, 500)?;
    let mut bid = Bid::place(&task, tasker, Amount::new(450)?, "offer", &clock)?;

    bid.reject(None, &clock)?;
    ensure!(bid.status() == BidStatus::Rejected);
    ensure!(bid.rejection_reason().is_none());
    Ok(())
}

#[rstest]
fn accept_then_reject_is_rejected(clock: DefaultClock) -> eyre::Result<()> {
    let customer = UserId::new();
    let tasker = UserId::new();
    let task = open_task(customer, 500)?;
    let mut bid = Bid::place(&task, tasker, Amount::new(450)?, "offer", &clock)?;
    bid.accept(&clock)?;

    let result = bid.reject(None, &clock);
    if !matches!(
        result,
        Err(TransitionError::InvalidBidState {
            status: BidStatus::Accepted,
            ..
        })
    ) {
        bail!("expected InvalidBidState, got {result:?}");
    }
    ensure!(bid.status() == BidStatus::Accepted);
    Ok(())
}
