//! Task aggregate root and the task lifecycle state machine.

use super::{
    Action, Amount, Bid, BidId, ParseTaskStatusError, TaskId, TransitionError, UserId,
    ValidationError,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Task lifecycle status.
///
/// Wire names are camelCase to match the event payload contract consumed by
/// clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// Task is accepting bids and may be edited or cancelled.
    Open,
    /// A bid has been accepted; work has not started.
    Assigned,
    /// The assigned tasker is working.
    InProgress,
    /// The tasker has asked the customer to confirm completion.
    CompletionRequested,
    /// The customer confirmed completion.
    Completed,
    /// The customer cancelled the task before assignment.
    Cancelled,
}

impl TaskStatus {
    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::InProgress => "inProgress",
            Self::CompletionRequested => "completionRequested",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns whether a direct transition to `target` is permitted.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Open, Self::Assigned | Self::Cancelled)
                | (Self::Assigned, Self::InProgress)
                | (Self::InProgress, Self::CompletionRequested)
                | (Self::CompletionRequested, Self::Completed | Self::InProgress)
        )
    }

    /// Returns whether this status admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns whether a task in this status must carry an assigned tasker.
    #[must_use]
    pub const fn requires_assignee(self) -> bool {
        matches!(
            self,
            Self::Assigned | Self::InProgress | Self::CompletionRequested | Self::Completed
        )
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "open" => Ok(Self::Open),
            "assigned" => Ok(Self::Assigned),
            "inProgress" => Ok(Self::InProgress),
            "completionRequested" => Ok(Self::CompletionRequested),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic coordinate attached to a task address.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

/// Customer-editable task fields.
///
/// Editable only while the task is [`TaskStatus::Open`]; the budget in
/// particular is immutable once the task leaves `Open`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDetails {
    title: String,
    description: String,
    category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    subcategory: Option<String>,
    budget: Amount,
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<GeoPoint>,
    required_at: DateTime<Utc>,
    duration_hours: u32,
    urgent: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

impl TaskDetails {
    /// Creates validated task details with required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyTitle`] or
    /// [`ValidationError::EmptyCategory`] when the respective field is empty
    /// after trimming.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        budget: Amount,
        address: impl Into<String>,
        required_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let category = category.into();
        if category.trim().is_empty() {
            return Err(ValidationError::EmptyCategory);
        }
        Ok(Self {
            title,
            description: description.into(),
            category,
            subcategory: None,
            budget,
            address: address.into(),
            location: None,
            required_at,
            duration_hours: 1,
            urgent: false,
            images: Vec::new(),
        })
    }

    /// Sets the subcategory.
    #[must_use]
    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    /// Sets the geocoordinate.
    #[must_use]
    pub const fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets the expected duration in hours.
    #[must_use]
    pub const fn with_duration_hours(mut self, hours: u32) -> Self {
        self.duration_hours = hours;
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

    /// Returns the task title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the task description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the category.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the subcategory, if any.
    #[must_use]
    pub fn subcategory(&self) -> Option<&str> {
        self.subcategory.as_deref()
    }

    /// Returns the budget.
    #[must_use]
    pub const fn budget(&self) -> Amount {
        self.budget
    }

    /// Returns the address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the geocoordinate, if any.
    #[must_use]
    pub const fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    /// Returns the required date/time.
    #[must_use]
    pub const fn required_at(&self) -> DateTime<Utc> {
        self.required_at
    }

    /// Returns the expected duration in hours.
    #[must_use]
    pub const fn duration_hours(&self) -> u32 {
        self.duration_hours
    }

    /// Returns the urgency flag.
    #[must_use]
    pub const fn urgent(&self) -> bool {
        self.urgent
    }

    /// Returns the opaque image references.
    #[must_use]
    pub fn images(&self) -> &[String] {
        &self.images
    }
}

/// Task aggregate root.
///
/// Owned by exactly one customer. Holds at most one accepted bid, whose
/// tasker equals the assigned tasker; the assignee is present iff the
/// status requires one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    customer: UserId,
    details: TaskDetails,
    status: TaskStatus,
    assigned_to: Option<UserId>,
    accepted_bid: Option<BidId>,
    completion_note: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted owning customer.
    pub customer: UserId,
    /// Persisted editable fields.
    pub details: TaskDetails,
    /// Persisted lifecycle status.
    pub status: TaskStatus,
    /// Persisted assigned tasker, if any.
    pub assigned_to: Option<UserId>,
    /// Persisted accepted bid, if any.
    pub accepted_bid: Option<BidId>,
    /// Persisted completion note, if any.
    pub completion_note: Option<String>,
    /// Persisted completion timestamp, if any.
    pub completed_at: Option<DateTime<Utc>>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest lifecycle timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new open task posted by `customer`.
    #[must_use]
    pub fn post(customer: UserId, details: TaskDetails, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: TaskId::new(),
            customer,
            details,
            status: TaskStatus::Open,
            assigned_to: None,
            accepted_bid: None,
            completion_note: None,
            completed_at: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        debug_assert!(
            data.status.requires_assignee() == data.assigned_to.is_some(),
            "persisted task assignee does not match its status"
        );
        Self {
            id: data.id,
            customer: data.customer,
            details: data.details,
            status: data.status,
            assigned_to: data.assigned_to,
            accepted_bid: data.accepted_bid,
            completion_note: data.completion_note,
            completed_at: data.completed_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning customer.
    #[must_use]
    pub const fn customer(&self) -> UserId {
        self.customer
    }

    /// Returns the editable fields.
    #[must_use]
    pub const fn details(&self) -> &TaskDetails {
        &self.details
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the assigned tasker, if any.
    #[must_use]
    pub const fn assigned_to(&self) -> Option<UserId> {
        self.assigned_to
    }

    /// Returns the accepted bid, if any.
    #[must_use]
    pub const fn accepted_bid(&self) -> Option<BidId> {
        self.accepted_bid
    }

    /// Returns the latest completion note, if any.
    #[must_use]
    pub fn completion_note(&self) -> Option<&str> {
        self.completion_note.as_deref()
    }

    /// Returns the completion timestamp, if any.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
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

    /// Returns whether the task accepts reviews.
    #[must_use]
    pub const fn is_review_eligible(&self) -> bool {
        matches!(self.status, TaskStatus::Completed)
    }

    /// Verifies that `actor` is the owning customer.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Unauthorized`] when `actor` is not the
    /// customer who posted the task.
    pub fn authorize_customer(&self, actor: UserId, action: Action) -> Result<(), TransitionError> {
        if actor != self.customer {
            return Err(TransitionError::Unauthorized {
                actor,
                action,
                task_id: self.id,
            });
        }
        Ok(())
    }

    /// Verifies that `actor` is the assigned tasker.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Unauthorized`] when `actor` is not the
    /// tasker the task is assigned to (including when nobody is assigned).
    pub fn authorize_assignee(&self, actor: UserId, action: Action) -> Result<(), TransitionError> {
        if self.assigned_to != Some(actor) {
            return Err(TransitionError::Unauthorized {
                actor,
                action,
                task_id: self.id,
            });
        }
        Ok(())
    }

    /// Replaces the editable fields.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Unauthorized`] when `actor` is not the
    /// customer, or [`TransitionError::InvalidTaskState`] when the task has
    /// left [`TaskStatus::Open`] (the budget is immutable from then on).
    pub fn edit_details(
        &mut self,
        actor: UserId,
        details: TaskDetails,
        clock: &impl Clock,
    ) -> Result<(), TransitionError> {
        self.authorize_customer(actor, Action::EditTask)?;
        self.require_status(TaskStatus::Open, Action::EditTask)?;
        self.details = details;
        self.touch(clock);
        Ok(())
    }

    /// Accepts `bid`, assigning the task to its bidder.
    ///
    /// Coupled with [`Bid::accept`](super::Bid::accept) through the store's
    /// atomic assignment commit; this method only validates and mutates the
    /// in-memory snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Unauthorized`] when `actor` is not the
    /// customer, [`TransitionError::InvalidTaskState`] when the task is not
    /// open, [`TransitionError::InvalidBidState`] when the bid is not
    /// pending, or [`TransitionError::Validation`] when the bid belongs to a
    /// different task.
    pub fn assign(
        &mut self,
        actor: UserId,
        bid: &Bid,
        clock: &impl Clock,
    ) -> Result<(), TransitionError> {
        self.authorize_customer(actor, Action::AcceptBid)?;
        if bid.task_id() != self.id {
            return Err(ValidationError::BidTaskMismatch {
                bid_id: bid.id(),
                task_id: self.id,
            }
            .into());
        }
        self.require_status(TaskStatus::Open, Action::AcceptBid)?;
        if !bid.status().is_pending() {
            return Err(TransitionError::InvalidBidState {
                bid_id: bid.id(),
                status: bid.status(),
                action: Action::AcceptBid,
            });
        }
        if self.accepted_bid.is_some() {
            return Err(TransitionError::ConflictingAccept(self.id));
        }
        self.status = TaskStatus::Assigned;
        self.assigned_to = Some(bid.bidder());
        self.accepted_bid = Some(bid.id());
        self.touch(clock);
        Ok(())
    }

    /// Begins work on an assigned task.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Unauthorized`] when `actor` is not the
    /// assigned tasker or [`TransitionError::InvalidTaskState`] when the
    /// task is not [`TaskStatus::Assigned`].
    pub fn start(&mut self, actor: UserId, clock: &impl Clock) -> Result<(), TransitionError> {
        self.authorize_assignee(actor, Action::Start)?;
        self.require_status(TaskStatus::Assigned, Action::Start)?;
        self.status = TaskStatus::InProgress;
        self.touch(clock);
        Ok(())
    }

    /// Asks the customer to confirm completion, recording a note.
    ///
    /// Repeated request/reject cycles are permitted without limit; each new
    /// request overwrites the previous note.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Unauthorized`] when `actor` is not the
    /// assigned tasker, [`TransitionError::InvalidTaskState`] when the task
    /// is not in progress, or [`TransitionError::Validation`] when the note
    /// is empty.
    pub fn request_completion(
        &mut self,
        actor: UserId,
        note: &str,
        clock: &impl Clock,
    ) -> Result<(), TransitionError> {
        self.authorize_assignee(actor, Action::RequestCompletion)?;
        self.require_status(TaskStatus::InProgress, Action::RequestCompletion)?;
        let trimmed = note.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyCompletionNote.into());
        }
        self.completion_note = Some(trimmed.to_owned());
        self.status = TaskStatus::CompletionRequested;
        self.touch(clock);
        Ok(())
    }

    /// Confirms a requested completion, closing the task.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Unauthorized`] when `actor` is not the
    /// customer or [`TransitionError::InvalidTaskState`] when no completion
    /// is awaiting confirmation (re-confirming a completed task included).
    pub fn confirm_completion(
        &mut self,
        actor: UserId,
        clock: &impl Clock,
    ) -> Result<(), TransitionError> {
        self.authorize_customer(actor, Action::ConfirmCompletion)?;
        self.require_status(TaskStatus::CompletionRequested, Action::ConfirmCompletion)?;
        self.status = TaskStatus::Completed;
        self.completed_at = Some(clock.utc());
        self.touch(clock);
        Ok(())
    }

    /// Rejects a requested completion, reverting the task to in-progress.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Unauthorized`] when `actor` is not the
    /// customer, [`TransitionError::InvalidTaskState`] when no completion is
    /// awaiting confirmation, or [`TransitionError::Validation`] when the
    /// reason is empty.
    pub fn reject_completion(
        &mut self,
        actor: UserId,
        reason: &str,
        clock: &impl Clock,
    ) -> Result<(), TransitionError> {
        self.authorize_customer(actor, Action::RejectCompletion)?;
        self.require_status(TaskStatus::CompletionRequested, Action::RejectCompletion)?;
        if reason.trim().is_empty() {
            return Err(ValidationError::EmptyRejectionReason.into());
        }
        self.status = TaskStatus::InProgress;
        self.touch(clock);
        Ok(())
    }

    /// Cancels an open task.
    ///
    /// The engine cascades cancellation to all pending bids through the
    /// store's cascade commit.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Unauthorized`] when `actor` is not the
    /// customer or [`TransitionError::InvalidTaskState`] when the task has
    /// already been assigned or closed.
    pub fn cancel(&mut self, actor: UserId, clock: &impl Clock) -> Result<(), TransitionError> {
        self.authorize_customer(actor, Action::CancelTask)?;
        self.require_status(TaskStatus::Open, Action::CancelTask)?;
        self.status = TaskStatus::Cancelled;
        self.touch(clock);
        Ok(())
    }

    /// Rejects the action unless the task is in `expected` status.
    fn require_status(&self, expected: TaskStatus, action: Action) -> Result<(), TransitionError> {
        if self.status != expected {
            return Err(TransitionError::InvalidTaskState {
                task_id: self.id,
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
