//! Error types and rejection taxonomy for marketplace transitions.

use super::{BidId, BidStatus, TaskId, TaskStatus, UserId};
use thiserror::Error;

/// Actions a user may request against a task or bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Replace the editable fields of an open task.
    EditTask,
    /// Place or resubmit a bid on an open task.
    PlaceBid,
    /// Accept a pending bid, assigning the task.
    AcceptBid,
    /// Reject a pending bid.
    RejectBid,
    /// Begin work on an assigned task.
    Start,
    /// Ask the customer to confirm completion.
    RequestCompletion,
    /// Confirm a requested completion.
    ConfirmCompletion,
    /// Send a requested completion back to in-progress.
    RejectCompletion,
    /// Cancel an open task.
    CancelTask,
    /// Leave a review on a completed task.
    Review,
}

impl Action {
    /// Returns the canonical action name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EditTask => "edit_task",
            Self::PlaceBid => "place_bid",
            Self::AcceptBid => "accept_bid",
            Self::RejectBid => "reject_bid",
            Self::Start => "start",
            Self::RequestCompletion => "request_completion",
            Self::ConfirmCompletion => "confirm_completion",
            Self::RejectCompletion => "reject_completion",
            Self::CancelTask => "cancel_task",
            Self::Review => "review",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input validation failures, corrected by the caller rather than retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// The category is empty after trimming.
    #[error("task category must not be empty")]
    EmptyCategory,

    /// A bid or budget amount of zero was supplied.
    #[error("amount must be positive")]
    NonPositiveAmount,

    /// The amount exceeds the persistable range.
    #[error("amount {0} exceeds the supported maximum")]
    AmountOutOfRange(u64),

    /// A completion request was made without a note.
    #[error("completion note must not be empty")]
    EmptyCompletionNote,

    /// A completion rejection was made without a reason.
    #[error("completion rejection reason must not be empty")]
    EmptyRejectionReason,

    /// The bid does not belong to the task it was applied against.
    #[error("bid {bid_id} does not belong to task {task_id}")]
    BidTaskMismatch {
        /// The bid that was applied.
        bid_id: BidId,
        /// The task it was applied against.
        task_id: TaskId,
    },

    /// The review rating is outside the accepted 1..=5 range.
    #[error("review rating {0} must be between 1 and 5")]
    InvalidRating(u8),
}

/// Rejection raised when a requested transition is not legal.
///
/// Every variant is a synchronous, non-retryable rejection evaluated before
/// any state is mutated; a rejected transition leaves both task and bid
/// exactly as they were.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// The actor is not the identity the action requires.
    #[error("user {actor} may not {action} task {task_id}")]
    Unauthorized {
        /// The user who requested the action.
        actor: UserId,
        /// The rejected action.
        action: Action,
        /// The task the action targeted.
        task_id: TaskId,
    },

    /// The task is not in a state from which the action is legal.
    #[error("task {task_id} is {status} and does not permit {action}")]
    InvalidTaskState {
        /// The task the action targeted.
        task_id: TaskId,
        /// The task status observed when the action was evaluated.
        status: TaskStatus,
        /// The rejected action.
        action: Action,
    },

    /// The bid is not in a state from which the action is legal.
    #[error("bid {bid_id} is {status} and does not permit {action}")]
    InvalidBidState {
        /// The bid the action targeted.
        bid_id: BidId,
        /// The bid status observed when the action was evaluated.
        status: BidStatus,
        /// The rejected action.
        action: Action,
    },

    /// Another accept won the race for the same task.
    #[error("task {0} was already assigned to another bid")]
    ConflictingAccept(TaskId),

    /// The request payload is malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Coarse rejection codes surfaced to calling clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionCode {
    /// Actor lacks the required identity; shown as a permission error.
    Unauthorized,
    /// The action is no longer available from the current state.
    InvalidState,
    /// A concurrent accept already assigned the task; refresh and retry.
    ConflictingAccept,
    /// Malformed input; correct and resubmit.
    Validation,
}

impl TransitionError {
    /// Returns the coarse rejection code for client-facing handling.
    #[must_use]
    pub const fn code(&self) -> RejectionCode {
        match self {
            Self::Unauthorized { .. } => RejectionCode::Unauthorized,
            Self::InvalidTaskState { .. } | Self::InvalidBidState { .. } => {
                RejectionCode::InvalidState
            }
            Self::ConflictingAccept(_) => RejectionCode::ConflictingAccept,
            Self::Validation(_) => RejectionCode::Validation,
        }
    }
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

/// Error returned while parsing bid statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown bid status: {0}")]
pub struct ParseBidStatusError(pub String);
