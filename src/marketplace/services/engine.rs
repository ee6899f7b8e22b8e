//! Transition engine: the single authority for task and bid transitions.
//!
//! Every operation follows validate-then-commit: guards run on cloned
//! snapshots, the store applies the result through a conditional write, and
//! exactly one domain event is published strictly after the write succeeds.
//! A rejected or raced operation mutates nothing and publishes nothing.

use crate::marketplace::{
    domain::{
        Action, Amount, Bid, BidId, BidStatus, DomainEvent, Review, Task, TaskDetails, TaskId,
        TaskStatus, TransitionError, UserId,
    },
    ports::{EventPublisher, MarketplaceStore, StoreError},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;

/// Request payload for posting a new task.
#[derive(Debug, Clone, PartialEq)]
pub struct PostTaskRequest {
    customer: UserId,
    title: String,
    description: String,
    category: String,
    subcategory: Option<String>,
    budget: u64,
    address: String,
    location: Option<crate::marketplace::domain::GeoPoint>,
    required_at: DateTime<Utc>,
    duration_hours: Option<u32>,
    urgent: bool,
    images: Vec<String>,
}

impl PostTaskRequest {
    /// Creates a request with required task fields.
    #[must_use]
    pub fn new(
        customer: UserId,
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        budget: u64,
        address: impl Into<String>,
        required_at: DateTime<Utc>,
    ) -> Self {
        Self {
            customer,
            title: title.into(),
            description: description.into(),
            category: category.into(),
            subcategory: None,
            budget,
            address: address.into(),
            location: None,
            required_at,
            duration_hours: None,
            urgent: false,
            images: Vec::new(),
        }
    }

    /// Sets the subcategory.
    #[must_use]
    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    /// Sets the geocoordinate.
    #[must_use]
    pub const fn with_location(mut self, location: crate::marketplace::domain::GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets the expected duration in hours.
    #[must_use]
    pub const fn with_duration_hours(mut self, hours: u32) -> Self {
        self.duration_hours = Some(hours);
        self
    }

    /// Marks the task as urgent.
    #[must_use]
    pub const fn with_urgent(mut self, urgent: bool) -> Self {
        self.urgent = urgent;
        self
    }

    /// Sets the opaque image references.
    #[must_use]
    pub fn with_images(mut self, images: impl IntoIterator<Item = String>) -> Self {
        self.images = images.into_iter().collect();
        self
    }

    fn into_details(self) -> Result<(UserId, TaskDetails), TransitionError> {
        let budget = Amount::new(self.budget)?;
        let mut details = TaskDetails::new(
            self.title,
            self.description,
            self.category,
            budget,
            self.address,
            self.required_at,
        )?;
        if let Some(subcategory) = self.subcategory {
            details = details.with_subcategory(subcategory);
        }
        if let Some(location) = self.location {
            details = details.with_location(location);
        }
        if let Some(hours) = self.duration_hours {
            details = details.with_duration_hours(hours);
        }
        details = details.with_urgent(self.urgent).with_images(self.images);
        Ok((self.customer, details))
    }
}

/// Request payload for placing (or resubmitting) a bid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceBidRequest {
    task_id: TaskId,
    bidder: UserId,
    amount: u64,
    message: String,
    estimated_days: Option<u32>,
}

impl PlaceBidRequest {
    /// Creates a request with required bid fields.
    #[must_use]
    pub fn new(
        task_id: TaskId,
        bidder: UserId,
        amount: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            task_id,
            bidder,
            amount,
            message: message.into(),
            estimated_days: None,
        }
    }

    /// Sets the estimated days to completion.
    #[must_use]
    pub const fn with_estimated_days(mut self, days: u32) -> Self {
        self.estimated_days = Some(days);
        self
    }
}

/// Result of a successful accept: the coupled task and bid snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// The task, now assigned.
    pub task: Task,
    /// The bid, now accepted.
    pub bid: Bid,
}

/// Result of a successful cancellation: the task and its cascaded bids.
#[derive(Debug, Clone, PartialEq)]
pub struct Cancellation {
    /// The task, now cancelled.
    pub task: Task,
    /// Every bid the cascade moved to cancelled.
    pub cancelled_bids: Vec<Bid>,
}

/// Service-level errors for transition operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The transition was rejected by a guard.
    #[error(transparent)]
    Domain(#[from] TransitionError),
    /// The store refused or failed the write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for transition engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// The single authority deciding whether a requested (actor, action,
/// target) triple is legal and applying it when it is.
pub struct TransitionEngine<S, C, P>
where
    S: MarketplaceStore,
    C: Clock + Send + Sync,
    P: EventPublisher,
{
    store: Arc<S>,
    clock: Arc<C>,
    publisher: Arc<P>,
}

impl<S, C, P> Clone for TransitionEngine<S, C, P>
where
    S: MarketplaceStore,
    C: Clock + Send + Sync,
    P: EventPublisher,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<S, C, P> TransitionEngine<S, C, P>
where
    S: MarketplaceStore,
    C: Clock + Send + Sync,
    P: EventPublisher,
{
    /// Creates a new transition engine.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>, publisher: Arc<P>) -> Self {
        Self {
            store,
            clock,
            publisher,
        }
    }

    /// Posts a new open task.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Domain`] when the request fails validation or
    /// [`EngineError::Store`] when persistence fails.
    pub async fn post_task(&self, request: PostTaskRequest) -> EngineResult<Task> {
        let (customer, details) = request.into_details()?;
        let task = Task::post(customer, details, &*self.clock);
        self.store.insert_task(&task).await?;
        Ok(task)
    }

    /// Replaces the editable fields of an open task.
    ///
    /// No event is emitted: edits are not part of the closed event set, and
    /// viewers converge through their reconciling fetches.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Domain`] when the actor is not the customer
    /// or the task has left `Open`.
    pub async fn edit_task(
        &self,
        task_id: TaskId,
        actor: UserId,
        details: TaskDetails,
    ) -> EngineResult<Task> {
        let mut task = self.require_task(task_id).await?;
        task.edit_details(actor, details, &*self.clock)?;
        self.store
            .update_task_if_status(&task, TaskStatus::Open)
            .await
            .map_err(|err| map_task_write(err, Action::EditTask))?;
        Ok(task)
    }

    /// Places a bid on an open task, or resubmits the bidder's existing
    /// pending bid.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Domain`] when the bidder is the customer, the
    /// task is not open, or the amount fails validation.
    pub async fn place_bid(&self, request: PlaceBidRequest) -> EngineResult<Bid> {
        let amount = Amount::new(request.amount).map_err(TransitionError::from)?;
        let task = self.require_task(request.task_id).await?;
        let existing = self
            .store
            .pending_bid_for(request.task_id, request.bidder)
            .await?;

        let bid = if let Some(stored) = existing {
            if task.status() != TaskStatus::Open {
                return Err(TransitionError::InvalidTaskState {
                    task_id: task.id(),
                    status: task.status(),
                    action: Action::PlaceBid,
                }
                .into());
            }
            let mut resubmitted = stored;
            resubmitted.resubmit(
                amount,
                request.message,
                request.estimated_days,
                &*self.clock,
            )?;
            self.store
                .update_bid_if_status(&resubmitted, BidStatus::Pending)
                .await
                .map_err(|err| map_bid_write(err, Action::PlaceBid))?;
            resubmitted
        } else {
            let mut placed = Bid::place(
                &task,
                request.bidder,
                amount,
                request.message,
                &*self.clock,
            )?;
            if let Some(days) = request.estimated_days {
                placed = placed.with_estimated_days(days);
            }
            self.store.insert_bid(&placed).await?;
            placed
        };

        self.publisher
            .publish(DomainEvent::bid_placed(&task, &bid, &*self.clock));
        Ok(bid)
    }

    /// Accepts a pending bid, assigning the task to its bidder.
    ///
    /// The bid acceptance and task assignment commit as one unit; sibling
    /// pending bids are left pending for explicit rejection. A concurrent
    /// accept on the same task loses with
    /// [`TransitionError::ConflictingAccept`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Domain`] when a guard rejects the accept or
    /// the commit loses a race, and [`EngineError::Store`] for persistence
    /// failures.
    pub async fn accept_bid(&self, bid_id: BidId, actor: UserId) -> EngineResult<Assignment> {
        let bid = self.require_bid(bid_id).await?;
        let task = self.require_task(bid.task_id()).await?;

        let mut new_task = task.clone();
        let mut new_bid = bid.clone();
        new_task.assign(actor, &bid, &*self.clock)?;
        new_bid.accept(&*self.clock)?;

        match self.store.commit_assignment(&new_task, &new_bid).await {
            Ok(()) => {}
            Err(StoreError::AssignmentConflict(task_id)) => {
                return Err(TransitionError::ConflictingAccept(task_id).into());
            }
            Err(err) => return Err(map_bid_write(err, Action::AcceptBid)),
        }

        self.publisher
            .publish(DomainEvent::bid_status_changed(&new_task, &new_bid, &*self.clock));
        Ok(Assignment {
            task: new_task,
            bid: new_bid,
        })
    }

    /// Rejects a pending bid, optionally storing a reason.
    ///
    /// The owning task's status never changes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Domain`] when the actor is not the customer
    /// or the bid has already been decided.
    pub async fn reject_bid(
        &self,
        bid_id: BidId,
        actor: UserId,
        reason: Option<String>,
    ) -> EngineResult<Bid> {
        let bid = self.require_bid(bid_id).await?;
        let task = self.require_task(bid.task_id()).await?;
        task.authorize_customer(actor, Action::RejectBid)?;

        let mut new_bid = bid;
        new_bid.reject(reason, &*self.clock)?;
        self.store
            .update_bid_if_status(&new_bid, BidStatus::Pending)
            .await
            .map_err(|err| map_bid_write(err, Action::RejectBid))?;

        self.publisher
            .publish(DomainEvent::bid_status_changed(&task, &new_bid, &*self.clock));
        Ok(new_bid)
    }

    /// Begins work on an assigned task.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Domain`] when the actor is not the assigned
    /// tasker or the task is not `Assigned`.
    pub async fn start_task(&self, task_id: TaskId, actor: UserId) -> EngineResult<Task> {
        let mut task = self.require_task(task_id).await?;
        task.start(actor, &*self.clock)?;
        self.store
            .update_task_if_status(&task, TaskStatus::Assigned)
            .await
            .map_err(|err| map_task_write(err, Action::Start))?;

        self.publisher
            .publish(DomainEvent::task_status_changed(&task, &*self.clock));
        Ok(task)
    }

    /// Asks the customer to confirm completion of an in-progress task.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Domain`] when the actor is not the assigned
    /// tasker, the task is not in progress, or the note is empty.
    pub async fn request_completion(
        &self,
        task_id: TaskId,
        actor: UserId,
        note: &str,
    ) -> EngineResult<Task> {
        let mut task = self.require_task(task_id).await?;
        task.request_completion(actor, note, &*self.clock)?;
        self.store
            .update_task_if_status(&task, TaskStatus::InProgress)
            .await
            .map_err(|err| map_task_write(err, Action::RequestCompletion))?;

        self.publisher
            .publish(DomainEvent::completion_requested(&task, &*self.clock));
        Ok(task)
    }

    /// Confirms a requested completion, closing the task.
    ///
    /// Optional feedback rides on the emitted event; a formal review is
    /// recorded separately through [`leave_review`](Self::leave_review),
    /// for which the completed task is now eligible.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Domain`] when the actor is not the customer
    /// or no completion is awaiting confirmation — re-confirming an
    /// already-completed task included.
    pub async fn confirm_completion(
        &self,
        task_id: TaskId,
        actor: UserId,
        feedback: Option<String>,
    ) -> EngineResult<Task> {
        let mut task = self.require_task(task_id).await?;
        task.confirm_completion(actor, &*self.clock)?;
        self.store
            .update_task_if_status(&task, TaskStatus::CompletionRequested)
            .await
            .map_err(|err| map_task_write(err, Action::ConfirmCompletion))?;

        let mut event = DomainEvent::task_status_changed(&task, &*self.clock);
        if let Some(feedback) = feedback {
            event = event.with_reason(feedback);
        }
        self.publisher.publish(event);
        Ok(task)
    }

    /// Rejects a requested completion, reverting the task to in-progress.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Domain`] when the actor is not the customer,
    /// no completion is awaiting confirmation, or the reason is empty.
    pub async fn reject_completion(
        &self,
        task_id: TaskId,
        actor: UserId,
        reason: &str,
    ) -> EngineResult<Task> {
        let mut task = self.require_task(task_id).await?;
        task.reject_completion(actor, reason, &*self.clock)?;
        self.store
            .update_task_if_status(&task, TaskStatus::CompletionRequested)
            .await
            .map_err(|err| map_task_write(err, Action::RejectCompletion))?;

        self.publisher
            .publish(DomainEvent::completion_rejected(&task, reason, &*self.clock));
        Ok(task)
    }

    /// Cancels an open task, cascading cancellation to its pending bids.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Domain`] when the actor is not the customer
    /// or the task has left `Open` (cancellation is never legal once
    /// assigned).
    pub async fn cancel_task(&self, task_id: TaskId, actor: UserId) -> EngineResult<Cancellation> {
        let mut task = self.require_task(task_id).await?;
        task.cancel(actor, &*self.clock)?;

        let mut cancelled_bids = Vec::new();
        for bid in self.store.bids_by_task(task_id).await? {
            if bid.status().is_pending() {
                let mut cancelled = bid;
                cancelled.cancel(&*self.clock)?;
                cancelled_bids.push(cancelled);
            }
        }

        self.store
            .commit_cancellation(&task, &cancelled_bids)
            .await
            .map_err(|err| map_task_write(err, Action::CancelTask))?;

        let event = DomainEvent::task_status_changed(&task, &*self.clock)
            .notify_also(cancelled_bids.iter().map(Bid::bidder));
        self.publisher.publish(event);
        Ok(Cancellation {
            task,
            cancelled_bids,
        })
    }

    /// Records a participant's review of a completed task.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Domain`] when the task is not completed, the
    /// reviewer was not a participant, or the rating is out of range, and
    /// [`EngineError::Store`] when the reviewer already reviewed the task.
    pub async fn leave_review(
        &self,
        task_id: TaskId,
        reviewer: UserId,
        rating: u8,
        comment: impl Into<String> + Send,
    ) -> EngineResult<Review> {
        let task = self.require_task(task_id).await?;
        let review = Review::new(&task, reviewer, rating, comment, &*self.clock)?;
        self.store.insert_review(&review).await?;
        Ok(review)
    }

    async fn require_task(&self, id: TaskId) -> EngineResult<Task> {
        let task = self.store.find_task(id).await?;
        task.ok_or(EngineError::Store(StoreError::TaskNotFound(id)))
    }

    async fn require_bid(&self, id: BidId) -> EngineResult<Bid> {
        let bid = self.store.find_bid(id).await?;
        bid.ok_or(EngineError::Store(StoreError::BidNotFound(id)))
    }
}

/// Maps a refused conditional task write onto the transition taxonomy.
fn map_task_write(err: StoreError, action: Action) -> EngineError {
    match err {
        StoreError::StaleTask { task_id, found, .. } => {
            EngineError::Domain(TransitionError::InvalidTaskState {
                task_id,
                status: found,
                action,
            })
        }
        other => EngineError::Store(other),
    }
}

/// Maps a refused conditional bid write onto the transition taxonomy.
fn map_bid_write(err: StoreError, action: Action) -> EngineError {
    match err {
        StoreError::StaleBid { bid_id, found, .. } => {
            EngineError::Domain(TransitionError::InvalidBidState {
                bid_id,
                status: found,
                action,
            })
        }
        other => EngineError::Store(other),
    }
}
