//! Domain model for the marketplace task/bid lifecycle.
//!
//! The domain owns the state machines and their guards: task statuses, bid
//! statuses, the coupled accept-bid assignment, and the events describing
//! committed transitions. All infrastructure concerns stay outside the
//! domain boundary.

mod bid;
mod error;
mod event;
mod ids;
mod review;
mod task;

pub use bid::{Bid, BidStatus, PersistedBidData};
pub use error::{
    Action, ParseBidStatusError, ParseTaskStatusError, RejectionCode, TransitionError,
    ValidationError,
};
pub use event::{DomainEvent, EventKind};
pub use ids::{Amount, BidId, TaskId, UserId};
pub use review::{PersistedReviewData, Review, ReviewId};
pub use task::{GeoPoint, PersistedTaskData, Task, TaskDetails, TaskStatus};
