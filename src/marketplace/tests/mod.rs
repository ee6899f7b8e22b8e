//! Unit tests for the marketplace module.
//!
//! Tests are organised by concern: the domain state machines, the bid
//! aggregate, the transition engine over the in-memory store, event
//! construction, the accept-race property, and postgres row conversions.

mod bid_tests;

use chrono::Utc;
use mockable::DefaultClock;

use crate::marketplace::domain::{Amount, Task, TaskDetails, UserId, ValidationError};

/// Baseline details for a plumbing task used across the suites.
pub(crate) fn sample_details(budget: u64) -> Result<TaskDetails, ValidationError> {
    Ok(TaskDetails::new(
        "Fix leaking kitchen tap",
        "The tap under the sink drips constantly and needs a new washer.",
        "plumbing",
        Amount::new(budget)?,
        "12 Canal Road",
        Utc::now(),
    )?
    .with_duration_hours(2))
}

/// Posts an open task owned by `customer`.
pub(crate) fn open_task(customer: UserId, budget: u64) -> Result<Task, ValidationError> {
    Ok(Task::post(customer, sample_details(budget)?, &DefaultClock))
}
