//! Shared harness for in-memory end-to-end tests.

use std::sync::Arc;

use chrono::Utc;
use mandi::marketplace::{
    adapters::memory::InMemoryMarketplaceStore,
    domain::{Bid, Task, UserId},
    services::{PlaceBidRequest, PostTaskRequest, TransitionEngine},
};
use mandi::realtime::dispatcher::EventDispatcher;
use mockable::DefaultClock;

/// Engine type wired to the in-memory store and the realtime dispatcher.
pub type TestEngine = TransitionEngine<InMemoryMarketplaceStore, DefaultClock, EventDispatcher>;

/// Shared fixture state for end-to-end tests.
pub struct Harness {
    /// Transition engine under test.
    pub engine: TestEngine,
    /// Backing store, for direct state assertions.
    pub store: Arc<InMemoryMarketplaceStore>,
    /// Dispatcher the engine publishes through.
    pub dispatcher: Arc<EventDispatcher>,
}

impl Harness {
    /// Builds an engine over fresh in-memory infrastructure.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(InMemoryMarketplaceStore::new());
        let dispatcher = Arc::new(EventDispatcher::new());
        let engine = TransitionEngine::new(
            Arc::clone(&store),
            Arc::new(DefaultClock),
            Arc::clone(&dispatcher),
        );
        Self {
            engine,
            store,
            dispatcher,
        }
    }

    /// Posts an open task owned by `customer`.
    pub async fn post_task(&self, customer: UserId, budget: u64) -> Task {
        self.engine
            .post_task(PostTaskRequest::new(
                customer,
                "Repair the garden gate",
                "Hinge has rusted through; replacement hinge provided.",
                "handyman",
                budget,
                "5 Willow Close",
                Utc::now(),
            ))
            .await
            .expect("task posting should succeed")
    }

    /// Places a pending bid by `bidder` on `task`.
    pub async fn place_bid(&self, task: &Task, bidder: UserId, amount: u64) -> Bid {
        self.engine
            .place_bid(PlaceBidRequest::new(
                task.id(),
                bidder,
                amount,
                "Happy to take this on",
            ))
            .await
            .expect("bid placement should succeed")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
