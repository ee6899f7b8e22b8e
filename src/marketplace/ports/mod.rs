//! Port contracts for marketplace storage and event publication.

mod events;
mod repository;

pub use events::EventPublisher;
pub use repository::{MarketplaceStore, StoreError, StoreResult};
