//! Client synchronization layer.
//!
//! Keeps each connected client's local views consistent with server truth:
//! events patch entries by entity id for responsiveness, reconciling
//! fetches converge on authoritative state, and a reconnect refreshes
//! everything because missed events are unknowable.

mod reconcile;
mod session;
mod subscriptions;
mod views;

pub use reconcile::{FetchClient, FetchError, Reconciler, StoreFetchClient};
pub use session::SyncSession;
pub use subscriptions::{EventScope, SubscriptionId, SubscriptionRegistry};
pub use views::{BidEntry, SessionViews, TaskDetailView, TaskEntry, ViewKind};
