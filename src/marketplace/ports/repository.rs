//! Storage port for marketplace persistence with conditional writes.
//!
//! Accepting a bid mutates a bid and its task as one unit, so a single
//! store contract covers both aggregates; splitting it per aggregate would
//! push the coupled transaction into application code.

use crate::marketplace::domain::{
    Bid, BidId, BidStatus, Review, Task, TaskId, TaskStatus, UserId,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Marketplace persistence contract.
///
/// Mutating methods are conditional: each snapshot is applied only when the
/// stored entity still holds the status the caller validated against, which
/// gives the single-writer-per-entity guarantee the transition engine
/// relies on.
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateTask`] when the task ID already
    /// exists.
    async fn insert_task(&self, task: &Task) -> StoreResult<()>;

    /// Applies a task snapshot only if the stored status equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`] when the task does not exist or
    /// [`StoreError::StaleTask`] when another writer moved the task first.
    async fn update_task_if_status(&self, task: &Task, expected: TaskStatus) -> StoreResult<()>;

    /// Finds a task by identifier; `None` when absent.
    async fn find_task(&self, id: TaskId) -> StoreResult<Option<Task>>;

    /// Returns all tasks posted by the given customer.
    async fn tasks_by_customer(&self, customer: UserId) -> StoreResult<Vec<Task>>;

    /// Returns all tasks currently assigned to the given tasker.
    async fn tasks_assigned_to(&self, tasker: UserId) -> StoreResult<Vec<Task>>;

    /// Stores a new bid.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateBid`] when the bid ID already exists.
    async fn insert_bid(&self, bid: &Bid) -> StoreResult<()>;

    /// Applies a bid snapshot only if the stored status equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BidNotFound`] when the bid does not exist or
    /// [`StoreError::StaleBid`] when another writer moved the bid first.
    async fn update_bid_if_status(&self, bid: &Bid, expected: BidStatus) -> StoreResult<()>;

    /// Finds a bid by identifier; `None` when absent.
    async fn find_bid(&self, id: BidId) -> StoreResult<Option<Bid>>;

    /// Returns all bids on the given task.
    async fn bids_by_task(&self, task_id: TaskId) -> StoreResult<Vec<Bid>>;

    /// Returns all bids placed by the given tasker.
    async fn bids_by_bidder(&self, bidder: UserId) -> StoreResult<Vec<Bid>>;

    /// Finds the bidder's pending bid on a task, if one exists.
    ///
    /// Drives resubmission: at most one pending bid per (task, bidder).
    async fn pending_bid_for(&self, task_id: TaskId, bidder: UserId) -> StoreResult<Option<Bid>>;

    /// Commits an accepted bid and its assigned task as one unit.
    ///
    /// The write applies only if the stored task is still
    /// [`TaskStatus::Open`] and the stored bid is still
    /// [`BidStatus::Pending`]; a raced accept loses here rather than
    /// half-applying.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AssignmentConflict`] when the task already
    /// left `Open`, [`StoreError::StaleBid`] when the bid was decided in
    /// the meantime, or the not-found variants when either row is missing.
    async fn commit_assignment(&self, task: &Task, accepted: &Bid) -> StoreResult<()>;

    /// Commits a cancelled task together with its cascaded bids.
    ///
    /// The task write applies only if the stored task is still
    /// [`TaskStatus::Open`]. Cascaded bids that were independently decided
    /// in the meantime are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`] when the task does not exist or
    /// [`StoreError::StaleTask`] when it already left `Open`.
    async fn commit_cancellation(&self, task: &Task, cancelled_bids: &[Bid]) -> StoreResult<()>;

    /// Stores a review.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateReview`] when the reviewer already
    /// reviewed the task.
    async fn insert_review(&self, review: &Review) -> StoreResult<()>;

    /// Returns all reviews of the given task.
    async fn reviews_for_task(&self, task_id: TaskId) -> StoreResult<Vec<Review>>;
}

/// Errors returned by store implementations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// A bid with the same identifier already exists.
    #[error("duplicate bid identifier: {0}")]
    DuplicateBid(BidId),

    /// The reviewer already reviewed the task.
    #[error("user {reviewer} already reviewed task {task_id}")]
    DuplicateReview {
        /// The reviewed task.
        task_id: TaskId,
        /// The reviewer who already has a review on record.
        reviewer: UserId,
    },

    /// The task was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The bid was not found.
    #[error("bid not found: {0}")]
    BidNotFound(BidId),

    /// A conditional task write observed a status other than expected.
    #[error("task {task_id} is {found}, expected {expected}")]
    StaleTask {
        /// The task whose write was refused.
        task_id: TaskId,
        /// The status the caller validated against.
        expected: TaskStatus,
        /// The status actually stored.
        found: TaskStatus,
    },

    /// A conditional bid write observed a status other than expected.
    #[error("bid {bid_id} is {found}, expected {expected}")]
    StaleBid {
        /// The bid whose write was refused.
        bid_id: BidId,
        /// The status the caller validated against.
        expected: BidStatus,
        /// The status actually stored.
        found: BidStatus,
    },

    /// An assignment commit lost the race for the task.
    #[error("task {0} is no longer open for assignment")]
    AssignmentConflict(TaskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
