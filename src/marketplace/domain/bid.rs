//! Bid aggregate and the bid state machine.

use super::{
    Action, Amount, BidId, ParseBidStatusError, Task, TaskId, TaskStatus, TransitionError, UserId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Bid lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BidStatus {
    /// Awaiting the customer's decision.
    Pending,
    /// Accepted; the task is assigned to this bid's tasker.
    Accepted,
    /// Explicitly rejected by the customer.
    Rejected,
    /// Cancelled because the task was cancelled.
    Cancelled,
}

impl BidStatus {
    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns whether the bid is still awaiting a decision.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns whether this status admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !self.is_pending()
    }
}

impl TryFrom<&str> for BidStatus {
    type Error = ParseBidStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseBidStatusError(value.to_owned())),
        }
    }
}

impl std::fmt::Display for BidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tasker's proposal to perform a specific task.
///
/// A tasker holds at most one pending bid per task; placing again while one
/// is pending is a resubmission that updates the existing bid in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    id: BidId,
    task_id: TaskId,
    bidder: UserId,
    amount: Amount,
    message: String,
    estimated_days: Option<u32>,
    status: BidStatus,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted bid.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedBidData {
    /// Persisted bid identifier.
    pub id: BidId,
    /// Persisted owning task.
    pub task_id: TaskId,
    /// Persisted bidding tasker.
    pub bidder: UserId,
    /// Persisted bid amount.
    pub amount: Amount,
    /// Persisted message to the customer.
    pub message: String,
    /// Persisted estimated days to completion, if given.
    pub estimated_days: Option<u32>,
    /// Persisted lifecycle status.
    pub status: BidStatus,
    /// Persisted rejection reason, if any.
    pub rejection_reason: Option<String>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest lifecycle timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Bid {
    /// Creates a new pending bid on an open task.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Unauthorized`] when the bidder is the
    /// task's own customer or [`TransitionError::InvalidTaskState`] when the
    /// task is no longer open.
    pub fn place(
        task: &Task,
        bidder: UserId,
        amount: Amount,
        message: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<Self, TransitionError> {
        if bidder == task.customer() {
            return Err(TransitionError::Unauthorized {
                actor: bidder,
                action: Action::PlaceBid,
                task_id: task.id(),
            });
        }
        if task.status() != TaskStatus::Open {
            return Err(TransitionError::InvalidTaskState {
                task_id: task.id(),
                status: task.status(),
                action: Action::PlaceBid,
            });
        }
        let timestamp = clock.utc();
        Ok(Self {
            id: BidId::new(),
            task_id: task.id(),
            bidder,
            amount,
            message: message.into(),
            estimated_days: None,
            status: BidStatus::Pending,
            rejection_reason: None,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Reconstructs a bid from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedBidData) -> Self {
        Self {
            id: data.id,
            task_id: data.task_id,
            bidder: data.bidder,
            amount: data.amount,
            message: data.message,
            estimated_days: data.estimated_days,
            status: data.status,
            rejection_reason: data.rejection_reason,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the bid identifier.
    #[must_use]
    pub const fn id(&self) -> BidId {
        self.id
    }

    /// Returns the owning task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the bidding tasker.
    #[must_use]
    pub const fn bidder(&self) -> UserId {
        self.bidder
    }

    /// Returns the bid amount.
    #[must_use]
    pub const fn amount(&self) -> Amount {
        self.amount
    }

    /// Returns the message to the customer.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the estimated days to completion, if given.
    #[must_use]
    pub const fn estimated_days(&self) -> Option<u32> {
        self.estimated_days
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> BidStatus {
        self.status
    }

    /// Returns the rejection reason, if any.
    #[must_use]
    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest lifecycle timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Sets the estimated days to completion.
    #[must_use]
    pub const fn with_estimated_days(mut self, days: u32) -> Self {
        self.estimated_days = Some(days);
        self
    }

    /// Updates amount, message, and estimate on a still-pending bid.
    ///
    /// This is the resubmission path: a tasker bidding again on the same
    /// task edits the existing pending bid rather than creating a second.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidBidState`] when the bid has already
    /// been decided.
    pub fn resubmit(
        &mut self,
        amount: Amount,
        message: impl Into<String>,
        estimated_days: Option<u32>,
        clock: &impl Clock,
    ) -> Result<(), TransitionError> {
        self.require_pending(Action::PlaceBid)?;
        self.amount = amount;
        self.message = message.into();
        self.estimated_days = estimated_days;
        self.touch(clock);
        Ok(())
    }

    /// Marks the bid accepted.
    ///
    /// Coupled with [`Task::assign`] through the store's atomic assignment
    /// commit; this method only validates and mutates the in-memory
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidBidState`] when the bid has already
    /// been decided.
    pub fn accept(&mut self, clock: &impl Clock) -> Result<(), TransitionError> {
        self.require_pending(Action::AcceptBid)?;
        self.status = BidStatus::Accepted;
        self.touch(clock);
        Ok(())
    }

    /// Marks the bid rejected, storing an optional reason.
    ///
    /// Rejection never changes the owning task's status.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidBidState`] when the bid has already
    /// been decided.
    pub fn reject(
        &mut self,
        reason: Option<String>,
        clock: &impl Clock,
    ) -> Result<(), TransitionError> {
        self.require_pending(Action::RejectBid)?;
        self.status = BidStatus::Rejected;
        self.rejection_reason = reason;
        self.touch(clock);
        Ok(())
    }

    /// Marks the bid cancelled as part of a task-cancellation cascade.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidBidState`] when the bid has already
    /// been decided.
    pub fn cancel(&mut self, clock: &impl Clock) -> Result<(), TransitionError> {
        self.require_pending(Action::CancelTask)?;
        self.status = BidStatus::Cancelled;
        self.touch(clock);
        Ok(())
    }

    /// Rejects the action unless the bid is still pending.
    fn require_pending(&self, action: Action) -> Result<(), TransitionError> {
        if !self.status.is_pending() {
            return Err(TransitionError::InvalidBidState {
                bid_id: self.id,
                status: self.status,
                action,
            });
        }
        Ok(())
    }

    /// Updates the `updated_at` timestamp to the current clock time.
    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
