//! Publication port for committed-transition events.

use crate::marketplace::domain::DomainEvent;

/// Publication contract for domain events.
///
/// The transition engine publishes exactly one event per committed
/// transition, strictly after the store write succeeds; a failed write
/// publishes nothing. Implementations fan the event out to each recipient's
/// channel and never block the caller.
pub trait EventPublisher: Send + Sync {
    /// Publishes one committed event.
    ///
    /// Recipients without a live channel are skipped; delivery concerns
    /// beyond the hand-off belong to the transport.
    fn publish(&self, event: DomainEvent);
}
