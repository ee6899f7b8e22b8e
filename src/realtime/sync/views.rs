//! Local view state derived from events and reconciling fetches.
//!
//! Each view patches entries by entity id — replace, never append — so an
//! optimistic local entry and the server-confirmed entry for the same id
//! reconcile instead of duplicating. Event-driven patches are best-effort;
//! the scheduled reconciling fetch is what converges a view on
//! authoritative state.

use crate::marketplace::domain::{
    Amount, Bid, BidId, BidStatus, DomainEvent, EventKind, Task, TaskId, TaskStatus, UserId,
};

/// The client views the sync layer maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Tasks the user posted or was assigned.
    MyTasks,
    /// Bids the user placed.
    MyBids,
    /// The one open task detail.
    TaskDetail,
}

/// One row of the "my tasks" list.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEntry {
    /// Task identifier.
    pub task_id: TaskId,
    /// Task title.
    pub title: String,
    /// Last known lifecycle status.
    pub status: TaskStatus,
    /// Task budget, when known.
    pub budget: Option<Amount>,
}

impl From<&Task> for TaskEntry {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id(),
            title: task.details().title().to_owned(),
            status: task.status(),
            budget: Some(task.details().budget()),
        }
    }
}

/// One row of the "my bids" list.
#[derive(Debug, Clone, PartialEq)]
pub struct BidEntry {
    /// Bid identifier.
    pub bid_id: BidId,
    /// Owning task.
    pub task_id: TaskId,
    /// Last known bid amount.
    pub amount: Amount,
    /// Last known lifecycle status.
    pub status: BidStatus,
    /// Rejection reason, when one was delivered.
    pub reason: Option<String>,
}

impl From<&Bid> for BidEntry {
    fn from(bid: &Bid) -> Self {
        Self {
            bid_id: bid.id(),
            task_id: bid.task_id(),
            amount: bid.amount(),
            status: bid.status(),
            reason: bid.rejection_reason().map(str::to_owned),
        }
    }
}

/// The open task detail: the task and its bid list.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDetailView {
    /// The task being viewed.
    pub task: TaskEntry,
    /// All bids on the task, newest last.
    pub bids: Vec<BidEntry>,
}

/// All views for one connected session, with per-view staleness flags.
///
/// A stale flag means the view's last reconciling fetch exhausted its retry
/// budget; the data shown may lag server truth until a later event or
/// reconnect refresh succeeds.
#[derive(Debug)]
pub struct SessionViews {
    user: UserId,
    my_tasks: Vec<TaskEntry>,
    my_bids: Vec<BidEntry>,
    detail: Option<TaskDetailView>,
    stale: Vec<ViewKind>,
}

impl SessionViews {
    /// Creates empty views for the given session user.
    #[must_use]
    pub const fn new(user: UserId) -> Self {
        Self {
            user,
            my_tasks: Vec::new(),
            my_bids: Vec::new(),
            detail: None,
            stale: Vec::new(),
        }
    }

    /// Returns the session user.
    #[must_use]
    pub const fn user(&self) -> UserId {
        self.user
    }

    /// Returns the "my tasks" entries.
    #[must_use]
    pub fn my_tasks(&self) -> &[TaskEntry] {
        &self.my_tasks
    }

    /// Returns the "my bids" entries.
    #[must_use]
    pub fn my_bids(&self) -> &[BidEntry] {
        &self.my_bids
    }

    /// Returns the open task detail, if any.
    #[must_use]
    pub const fn detail(&self) -> Option<&TaskDetailView> {
        self.detail.as_ref()
    }

    /// Returns the task currently open in the detail view, if any.
    #[must_use]
    pub fn detail_task_id(&self) -> Option<TaskId> {
        self.detail.as_ref().map(|detail| detail.task.task_id)
    }

    /// Opens the task detail view.
    pub fn open_detail(&mut self, task: TaskEntry, bids: Vec<BidEntry>) {
        self.detail = Some(TaskDetailView { task, bids });
    }

    /// Closes the task detail view.
    pub fn close_detail(&mut self) {
        self.detail = None;
        self.stale.retain(|view| *view != ViewKind::TaskDetail);
    }

    /// Returns the views currently displayed, for full-refresh sweeps.
    #[must_use]
    pub fn displayed_views(&self) -> Vec<ViewKind> {
        let mut views = vec![ViewKind::MyTasks, ViewKind::MyBids];
        if self.detail.is_some() {
            views.push(ViewKind::TaskDetail);
        }
        views
    }

    /// Returns whether the view's last reconcile exhausted its retries.
    #[must_use]
    pub fn is_stale(&self, view: ViewKind) -> bool {
        self.stale.contains(&view)
    }

    /// Flags the view as lagging server truth.
    pub fn mark_stale(&mut self, view: ViewKind) {
        if !self.stale.contains(&view) {
            self.stale.push(view);
        }
    }

    /// Records an optimistic local task entry (e.g. the user just posted).
    pub fn record_local_task(&mut self, entry: TaskEntry) {
        upsert_task(&mut self.my_tasks, entry);
    }

    /// Records an optimistic local bid entry (e.g. the user just bid).
    pub fn record_local_bid(&mut self, entry: BidEntry) {
        upsert_bid(&mut self.my_bids, entry);
    }

    /// Replaces the "my tasks" view with server-confirmed state.
    pub fn replace_my_tasks(&mut self, tasks: &[Task]) {
        self.my_tasks = tasks.iter().map(TaskEntry::from).collect();
        self.stale.retain(|view| *view != ViewKind::MyTasks);
    }

    /// Replaces the "my bids" view with server-confirmed state.
    pub fn replace_my_bids(&mut self, bids: &[Bid]) {
        self.my_bids = bids.iter().map(BidEntry::from).collect();
        self.stale.retain(|view| *view != ViewKind::MyBids);
    }

    /// Replaces the open detail view with server-confirmed state.
    ///
    /// Ignored when the detail view has been closed or moved to another
    /// task in the meantime.
    pub fn replace_detail(&mut self, task: &Task, bids: &[Bid]) {
        if self.detail_task_id() != Some(task.id()) {
            return;
        }
        self.detail = Some(TaskDetailView {
            task: TaskEntry::from(task),
            bids: bids.iter().map(BidEntry::from).collect(),
        });
        self.stale.retain(|view| *view != ViewKind::TaskDetail);
    }

    /// Applies an event's embedded data to the affected views and returns
    /// which views should schedule a reconciling fetch.
    ///
    /// The event-kind-to-view mapping is this exhaustive match; adding an
    /// event kind without extending it is a compile error.
    pub fn apply_event(&mut self, event: &DomainEvent) -> Vec<ViewKind> {
        match event.kind() {
            EventKind::BidPlaced => {
                self.patch_bid_from(event);
                self.affected(&[ViewKind::MyBids, ViewKind::TaskDetail], event)
            }
            EventKind::BidStatusChanged => {
                self.patch_bid_from(event);
                self.affected(
                    &[ViewKind::MyBids, ViewKind::MyTasks, ViewKind::TaskDetail],
                    event,
                )
            }
            EventKind::TaskStatusChanged
            | EventKind::CompletionRequested
            | EventKind::CompletionRejected => {
                self.patch_task_from(event);
                self.affected(&[ViewKind::MyTasks, ViewKind::TaskDetail], event)
            }
        }
    }

    /// Patches task status in the list and detail views from event data.
    fn patch_task_from(&mut self, event: &DomainEvent) {
        let Ok(status) = TaskStatus::try_from(event.status()) else {
            return;
        };
        if let Some(entry) = self
            .my_tasks
            .iter_mut()
            .find(|entry| entry.task_id == event.task_id())
        {
            entry.status = status;
        }
        if let Some(detail) = self.detail.as_mut()
            && detail.task.task_id == event.task_id()
        {
            detail.task.status = status;
        }
    }

    /// Patches bid entries in the list and detail views from event data.
    ///
    /// A bid event for an id the session has never seen is not added to
    /// "my bids": the payload does not identify the bidder, so ownership is
    /// only known for entries the user created locally. The reconciling
    /// fetch supplies anything missed.
    fn patch_bid_from(&mut self, event: &DomainEvent) {
        let Some(bid_id) = event.bid_id() else {
            return;
        };
        let status = BidStatus::try_from(event.status()).ok();

        if let Some(entry) = self.my_bids.iter_mut().find(|entry| entry.bid_id == bid_id) {
            if let Some(status) = status {
                entry.status = status;
            }
            if let Some(amount) = event.amount() {
                entry.amount = amount;
            }
            if let Some(reason) = event.reason() {
                entry.reason = Some(reason.to_owned());
            }
        }

        // Detail rows need the embedded amount; a payload without one is
        // left to the reconciling fetch.
        if let Some(amount) = event.amount()
            && let Some(detail) = self.detail.as_mut()
            && detail.task.task_id == event.task_id()
        {
            let entry = BidEntry {
                bid_id,
                task_id: event.task_id(),
                amount,
                status: status.unwrap_or(BidStatus::Pending),
                reason: event.reason().map(str::to_owned),
            };
            upsert_bid(&mut detail.bids, entry);
        }
    }

    /// Filters candidate views down to the ones this session displays.
    fn affected(&self, candidates: &[ViewKind], event: &DomainEvent) -> Vec<ViewKind> {
        candidates
            .iter()
            .copied()
            .filter(|view| match view {
                ViewKind::MyTasks | ViewKind::MyBids => true,
                ViewKind::TaskDetail => self.detail_task_id() == Some(event.task_id()),
            })
            .collect()
    }
}

/// Inserts or replaces a task entry, matching by task id.
fn upsert_task(entries: &mut Vec<TaskEntry>, entry: TaskEntry) {
    if let Some(existing) = entries
        .iter_mut()
        .find(|candidate| candidate.task_id == entry.task_id)
    {
        *existing = entry;
    } else {
        entries.push(entry);
    }
}

/// Inserts or replaces a bid entry, matching by bid id.
fn upsert_bid(entries: &mut Vec<BidEntry>, entry: BidEntry) {
    if let Some(existing) = entries
        .iter_mut()
        .find(|candidate| candidate.bid_id == entry.bid_id)
    {
        *existing = entry;
    } else {
        entries.push(entry);
    }
}
