//! Domain events describing committed transitions.
//!
//! Every successfully applied transition produces exactly one event. The
//! serialized form is the payload pushed to clients; recipients and the
//! occurrence timestamp are routing metadata and stay out of the payload.

use super::{Amount, Bid, BidId, Task, TaskId, UserId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Closed set of event types mirroring the transition actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A bid was placed or resubmitted on a task.
    BidPlaced,
    /// A bid moved to accepted, rejected, or cancelled.
    BidStatusChanged,
    /// A task moved to a new lifecycle status.
    TaskStatusChanged,
    /// The assigned tasker asked for completion confirmation.
    CompletionRequested,
    /// The customer sent a completion request back to in-progress.
    CompletionRejected,
}

impl EventKind {
    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BidPlaced => "bid_placed",
            Self::BidStatusChanged => "bid_status_changed",
            Self::TaskStatusChanged => "task_status_changed",
            Self::CompletionRequested => "completion_requested",
            Self::CompletionRejected => "completion_rejected",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed record of one committed transition.
///
/// Serializes to the client payload shape:
/// `{ type, taskId, bidId?, status, amount?, taskTitle?, reason? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Event type from the closed set.
    #[serde(rename = "type")]
    kind: EventKind,
    /// The affected task.
    task_id: TaskId,
    /// The affected bid, when the transition concerns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bid_id: Option<BidId>,
    /// New status of the affected entity, in wire form.
    status: String,
    /// Bid amount, embedded so lists can patch without a fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    amount: Option<Amount>,
    /// Task title, embedded so recipients can render without a fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    task_title: Option<String>,
    /// Human-readable reason accompanying rejections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    /// Users to notify; routing metadata, not payload.
    #[serde(skip)]
    recipients: Vec<UserId>,
    /// When the transition was committed; routing metadata, not payload.
    #[serde(skip, default = "Utc::now")]
    occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    /// Builds a `bid_placed` event notifying the customer and the bidder.
    #[must_use]
    pub fn bid_placed(task: &Task, bid: &Bid, clock: &impl Clock) -> Self {
        Self {
            kind: EventKind::BidPlaced,
            task_id: task.id(),
            bid_id: Some(bid.id()),
            status: bid.status().as_str().to_owned(),
            amount: Some(bid.amount()),
            task_title: Some(task.details().title().to_owned()),
            reason: None,
            recipients: dedup(vec![task.customer(), bid.bidder()]),
            occurred_at: clock.utc(),
        }
    }

    /// Builds a `bid_status_changed` event notifying the customer and the
    /// bid's tasker.
    ///
    /// Carries the bid's new status; for an accepted bid the coupled task
    /// assignment rides the same event, so no separate task event is
    /// emitted.
    #[must_use]
    pub fn bid_status_changed(task: &Task, bid: &Bid, clock: &impl Clock) -> Self {
        Self {
            kind: EventKind::BidStatusChanged,
            task_id: task.id(),
            bid_id: Some(bid.id()),
            status: bid.status().as_str().to_owned(),
            amount: Some(bid.amount()),
            task_title: Some(task.details().title().to_owned()),
            reason: bid.rejection_reason().map(str::to_owned),
            recipients: dedup(vec![task.customer(), bid.bidder()]),
            occurred_at: clock.utc(),
        }
    }

    /// Builds a `task_status_changed` event notifying the customer and the
    /// assigned tasker, when one exists.
    #[must_use]
    pub fn task_status_changed(task: &Task, clock: &impl Clock) -> Self {
        let mut recipients = vec![task.customer()];
        recipients.extend(task.assigned_to());
        Self {
            kind: EventKind::TaskStatusChanged,
            task_id: task.id(),
            bid_id: None,
            status: task.status().as_str().to_owned(),
            amount: None,
            task_title: Some(task.details().title().to_owned()),
            reason: None,
            recipients: dedup(recipients),
            occurred_at: clock.utc(),
        }
    }

    /// Builds a `completion_requested` event carrying the tasker's note.
    #[must_use]
    pub fn completion_requested(task: &Task, clock: &impl Clock) -> Self {
        let mut recipients = vec![task.customer()];
        recipients.extend(task.assigned_to());
        Self {
            kind: EventKind::CompletionRequested,
            task_id: task.id(),
            bid_id: None,
            status: task.status().as_str().to_owned(),
            amount: None,
            task_title: Some(task.details().title().to_owned()),
            reason: task.completion_note().map(str::to_owned),
            recipients: dedup(recipients),
            occurred_at: clock.utc(),
        }
    }

    /// Builds a `completion_rejected` event carrying the customer's reason.
    #[must_use]
    pub fn completion_rejected(task: &Task, reason: impl Into<String>, clock: &impl Clock) -> Self {
        let mut recipients = vec![task.customer()];
        recipients.extend(task.assigned_to());
        Self {
            kind: EventKind::CompletionRejected,
            task_id: task.id(),
            bid_id: None,
            status: task.status().as_str().to_owned(),
            amount: None,
            task_title: Some(task.details().title().to_owned()),
            reason: Some(reason.into()),
            recipients: dedup(recipients),
            occurred_at: clock.utc(),
        }
    }

    /// Adds further recipients, such as bidders in a cancellation cascade.
    #[must_use]
    pub fn notify_also(mut self, users: impl IntoIterator<Item = UserId>) -> Self {
        self.recipients.extend(users);
        self.recipients = dedup(std::mem::take(&mut self.recipients));
        self
    }

    /// Attaches a human-readable reason to the payload.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the event type.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Returns the affected task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the affected bid, if any.
    #[must_use]
    pub const fn bid_id(&self) -> Option<BidId> {
        self.bid_id
    }

    /// Returns the new status in wire form.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Returns the embedded bid amount, if any.
    #[must_use]
    pub const fn amount(&self) -> Option<Amount> {
        self.amount
    }

    /// Returns the embedded task title, if any.
    #[must_use]
    pub fn task_title(&self) -> Option<&str> {
        self.task_title.as_deref()
    }

    /// Returns the attached reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns the users to notify.
    #[must_use]
    pub fn recipients(&self) -> &[UserId] {
        &self.recipients
    }

    /// Returns whether `user` is among the notified set.
    #[must_use]
    pub fn notifies(&self, user: UserId) -> bool {
        self.recipients.contains(&user)
    }

    /// Returns when the transition was committed.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Removes duplicate recipients while preserving first-seen order.
fn dedup(users: Vec<UserId>) -> Vec<UserId> {
    let mut seen = Vec::with_capacity(users.len());
    for user in users {
        if !seen.contains(&user) {
            seen.push(user);
        }
    }
    seen
}
