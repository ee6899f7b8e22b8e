//! Unit tests for the realtime module.
//!
//! Covers dispatcher fan-out and ordering, the subscription registry,
//! view patching, reconciling fetches, and the end-to-end session flow.

mod reconcile_tests;

use chrono::Utc;
use mockable::DefaultClock;

use crate::marketplace::domain::{
    Amount, Bid, Task, TaskDetails, TransitionError, UserId, ValidationError,
};

/// Posts an open task owned by `customer`.
pub(crate) fn open_task(customer: UserId, budget: u64) -> Result<Task, ValidationError> {
    let details = TaskDetails::new(
        "Mount the television",
        "55 inch set, bracket supplied.",
        "handyman",
        Amount::new(budget)?,
        "9 River Walk",
        Utc::now(),
    )?;
    Ok(Task::post(customer, details, &DefaultClock))
}

/// Places a pending bid by `tasker` on `task`.
pub(crate) fn pending_bid(
    task: &Task,
    tasker: UserId,
    amount: u64,
) -> Result<Bid, TransitionError> {
    Bid::place(
        task,
        tasker,
        Amount::new(amount)?,
        "I have the tools",
        &DefaultClock,
    )
}
