//! Diesel row models for marketplace persistence.

use super::schema::{bids, reviews, tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Owning customer.
    pub customer: uuid::Uuid,
    /// Editable fields JSON payload.
    pub details: Value,
    /// Lifecycle status.
    pub status: String,
    /// Assigned tasker, if any.
    pub assigned_to: Option<uuid::Uuid>,
    /// Accepted bid, if any.
    pub accepted_bid: Option<uuid::Uuid>,
    /// Latest completion note, if any.
    pub completion_note: Option<String>,
    /// Completion timestamp, if any.
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Owning customer.
    pub customer: uuid::Uuid,
    /// Editable fields JSON payload.
    pub details: Value,
    /// Lifecycle status.
    pub status: String,
    /// Assigned tasker, if any.
    pub assigned_to: Option<uuid::Uuid>,
    /// Accepted bid, if any.
    pub accepted_bid: Option<uuid::Uuid>,
    /// Latest completion note, if any.
    pub completion_note: Option<String>,
    /// Completion timestamp, if any.
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for bid records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bids)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BidRow {
    /// Bid identifier.
    pub id: uuid::Uuid,
    /// Owning task.
    pub task_id: uuid::Uuid,
    /// Bidding tasker.
    pub bidder: uuid::Uuid,
    /// Amount in whole currency units.
    pub amount: i64,
    /// Message to the customer.
    pub message: String,
    /// Estimated days to completion, if given.
    pub estimated_days: Option<i32>,
    /// Lifecycle status.
    pub status: String,
    /// Rejection reason, if any.
    pub rejection_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for bid records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bids)]
pub struct NewBidRow {
    /// Bid identifier.
    pub id: uuid::Uuid,
    /// Owning task.
    pub task_id: uuid::Uuid,
    /// Bidding tasker.
    pub bidder: uuid::Uuid,
    /// Amount in whole currency units.
    pub amount: i64,
    /// Message to the customer.
    pub message: String,
    /// Estimated days to completion, if given.
    pub estimated_days: Option<i32>,
    /// Lifecycle status.
    pub status: String,
    /// Rejection reason, if any.
    pub rejection_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result row for review records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = reviews)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReviewRow {
    /// Review identifier.
    pub id: uuid::Uuid,
    /// Reviewed task.
    pub task_id: uuid::Uuid,
    /// Reviewing participant.
    pub reviewer: uuid::Uuid,
    /// Rating in 1..=5.
    pub rating: i16,
    /// Free-text comment.
    pub comment: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert model for review records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = reviews)]
pub struct NewReviewRow {
    /// Review identifier.
    pub id: uuid::Uuid,
    /// Reviewed task.
    pub task_id: uuid::Uuid,
    /// Reviewing participant.
    pub reviewer: uuid::Uuid,
    /// Rating in 1..=5.
    pub rating: i16,
    /// Free-text comment.
    pub comment: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
