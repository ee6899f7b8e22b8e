//! Review bookkeeping entity recorded once a task completes.

use super::{Action, Task, TaskId, TransitionError, UserId, ValidationError};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a review record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(Uuid);

impl ReviewId {
    /// Creates a new random review identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a review identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for ReviewId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReviewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One participant's review of a completed task.
///
/// The store enforces at most one review per (task, reviewer) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    id: ReviewId,
    task_id: TaskId,
    reviewer: UserId,
    rating: u8,
    comment: String,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted review.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedReviewData {
    /// Persisted review identifier.
    pub id: ReviewId,
    /// Persisted reviewed task.
    pub task_id: TaskId,
    /// Persisted reviewing participant.
    pub reviewer: UserId,
    /// Persisted rating in 1..=5.
    pub rating: u8,
    /// Persisted free-text comment.
    pub comment: String,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Reconstructs a review from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedReviewData) -> Self {
        Self {
            id: data.id,
            task_id: data.task_id,
            reviewer: data.reviewer,
            rating: data.rating,
            comment: data.comment,
            created_at: data.created_at,
        }
    }

    /// Creates a review of a completed task.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::InvalidTaskState`] when the task is not
    /// completed, [`TransitionError::Unauthorized`] when the reviewer was
    /// not a participant, or [`TransitionError::Validation`] when the rating
    /// is outside 1..=5.
    pub fn new(
        task: &Task,
        reviewer: UserId,
        rating: u8,
        comment: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<Self, TransitionError> {
        if !task.is_review_eligible() {
            return Err(TransitionError::InvalidTaskState {
                task_id: task.id(),
                status: task.status(),
                action: Action::Review,
            });
        }
        if reviewer != task.customer() && task.assigned_to() != Some(reviewer) {
            return Err(TransitionError::Unauthorized {
                actor: reviewer,
                action: Action::Review,
                task_id: task.id(),
            });
        }
        if !(1..=5).contains(&rating) {
            return Err(ValidationError::InvalidRating(rating).into());
        }
        Ok(Self {
            id: ReviewId::new(),
            task_id: task.id(),
            reviewer,
            rating,
            comment: comment.into(),
            created_at: clock.utc(),
        })
    }

    /// Returns the review identifier.
    #[must_use]
    pub const fn id(&self) -> ReviewId {
        self.id
    }

    /// Returns the reviewed task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the reviewing participant.
    #[must_use]
    pub const fn reviewer(&self) -> UserId {
        self.reviewer
    }

    /// Returns the rating in 1..=5.
    #[must_use]
    pub const fn rating(&self) -> u8 {
        self.rating
    }

    /// Returns the free-text comment.
    #[must_use]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
