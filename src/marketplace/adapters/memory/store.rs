//! Thread-safe in-memory store for marketplace tests.
//!
//! Conditional writes re-check stored status under a single write lock,
//! which is this adapter's realization of the compare-and-swap contract.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::marketplace::{
    domain::{Bid, BidId, BidStatus, Review, Task, TaskId, TaskStatus, UserId},
    ports::{MarketplaceStore, StoreError, StoreResult},
};

/// Thread-safe in-memory marketplace store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarketplaceStore {
    state: Arc<RwLock<InMemoryState>>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    tasks: HashMap<TaskId, Task>,
    bids: HashMap<BidId, Bid>,
    customer_index: HashMap<UserId, Vec<TaskId>>,
    task_bid_index: HashMap<TaskId, Vec<BidId>>,
    bidder_index: HashMap<UserId, Vec<BidId>>,
    reviews: HashMap<TaskId, Vec<Review>>,
}

impl InMemoryMarketplaceStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, InMemoryState>> {
        self.state
            .read()
            .map_err(|err| StoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write_state(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, InMemoryState>> {
        self.state
            .write()
            .map_err(|err| StoreError::persistence(std::io::Error::other(err.to_string())))
    }
}

/// Checks the stored task status against the caller's expectation.
fn check_task_status(
    state: &InMemoryState,
    task_id: TaskId,
    expected: TaskStatus,
) -> StoreResult<()> {
    let stored = state
        .tasks
        .get(&task_id)
        .ok_or(StoreError::TaskNotFound(task_id))?;
    if stored.status() != expected {
        return Err(StoreError::StaleTask {
            task_id,
            expected,
            found: stored.status(),
        });
    }
    Ok(())
}

/// Checks the stored bid status against the caller's expectation.
fn check_bid_status(state: &InMemoryState, bid_id: BidId, expected: BidStatus) -> StoreResult<()> {
    let stored = state
        .bids
        .get(&bid_id)
        .ok_or(StoreError::BidNotFound(bid_id))?;
    if stored.status() != expected {
        return Err(StoreError::StaleBid {
            bid_id,
            expected,
            found: stored.status(),
        });
    }
    Ok(())
}

#[async_trait]
impl MarketplaceStore for InMemoryMarketplaceStore {
    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        let mut state = self.write_state()?;
        if state.tasks.contains_key(&task.id()) {
            return Err(StoreError::DuplicateTask(task.id()));
        }
        state
            .customer_index
            .entry(task.customer())
            .or_default()
            .push(task.id());
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn update_task_if_status(&self, task: &Task, expected: TaskStatus) -> StoreResult<()> {
        let mut state = self.write_state()?;
        check_task_status(&state, task.id(), expected)?;
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn find_task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        let state = self.read_state()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn tasks_by_customer(&self, customer: UserId) -> StoreResult<Vec<Task>> {
        let state = self.read_state()?;
        let tasks = state
            .customer_index
            .get(&customer)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.tasks.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(tasks)
    }

    async fn tasks_assigned_to(&self, tasker: UserId) -> StoreResult<Vec<Task>> {
        let state = self.read_state()?;
        Ok(state
            .tasks
            .values()
            .filter(|task| task.assigned_to() == Some(tasker))
            .cloned()
            .collect())
    }

    async fn insert_bid(&self, bid: &Bid) -> StoreResult<()> {
        let mut state = self.write_state()?;
        if state.bids.contains_key(&bid.id()) {
            return Err(StoreError::DuplicateBid(bid.id()));
        }
        state
            .task_bid_index
            .entry(bid.task_id())
            .or_default()
            .push(bid.id());
        state
            .bidder_index
            .entry(bid.bidder())
            .or_default()
            .push(bid.id());
        state.bids.insert(bid.id(), bid.clone());
        Ok(())
    }

    async fn update_bid_if_status(&self, bid: &Bid, expected: BidStatus) -> StoreResult<()> {
        let mut state = self.write_state()?;
        check_bid_status(&state, bid.id(), expected)?;
        state.bids.insert(bid.id(), bid.clone());
        Ok(())
    }

    async fn find_bid(&self, id: BidId) -> StoreResult<Option<Bid>> {
        let state = self.read_state()?;
        Ok(state.bids.get(&id).cloned())
    }

    async fn bids_by_task(&self, task_id: TaskId) -> StoreResult<Vec<Bid>> {
        let state = self.read_state()?;
        let bids = state
            .task_bid_index
            .get(&task_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.bids.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(bids)
    }

    async fn bids_by_bidder(&self, bidder: UserId) -> StoreResult<Vec<Bid>> {
        let state = self.read_state()?;
        let bids = state
            .bidder_index
            .get(&bidder)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.bids.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(bids)
    }

    async fn pending_bid_for(&self, task_id: TaskId, bidder: UserId) -> StoreResult<Option<Bid>> {
        let state = self.read_state()?;
        let bid = state
            .task_bid_index
            .get(&task_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.bids.get(id))
            .find(|bid| bid.bidder() == bidder && bid.status().is_pending())
            .cloned();
        Ok(bid)
    }

    async fn commit_assignment(&self, task: &Task, accepted: &Bid) -> StoreResult<()> {
        let mut state = self.write_state()?;
        match check_task_status(&state, task.id(), TaskStatus::Open) {
            Ok(()) => {}
            Err(StoreError::StaleTask { task_id, .. }) => {
                return Err(StoreError::AssignmentConflict(task_id));
            }
            Err(other) => return Err(other),
        }
        check_bid_status(&state, accepted.id(), BidStatus::Pending)?;
        state.tasks.insert(task.id(), task.clone());
        state.bids.insert(accepted.id(), accepted.clone());
        Ok(())
    }

    async fn commit_cancellation(&self, task: &Task, cancelled_bids: &[Bid]) -> StoreResult<()> {
        let mut state = self.write_state()?;
        check_task_status(&state, task.id(), TaskStatus::Open)?;
        state.tasks.insert(task.id(), task.clone());
        for bid in cancelled_bids {
            // Bids decided independently in the race window stay decided.
            if check_bid_status(&state, bid.id(), BidStatus::Pending).is_ok() {
                state.bids.insert(bid.id(), bid.clone());
            }
        }
        Ok(())
    }

    async fn insert_review(&self, review: &Review) -> StoreResult<()> {
        let mut state = self.write_state()?;
        let reviews = state.reviews.entry(review.task_id()).or_default();
        if reviews
            .iter()
            .any(|existing| existing.reviewer() == review.reviewer())
        {
            return Err(StoreError::DuplicateReview {
                task_id: review.task_id(),
                reviewer: review.reviewer(),
            });
        }
        reviews.push(review.clone());
        Ok(())
    }

    async fn reviews_for_task(&self, task_id: TaskId) -> StoreResult<Vec<Review>> {
        let state = self.read_state()?;
        Ok(state.reviews.get(&task_id).cloned().unwrap_or_default())
    }
}
