//! `PostgreSQL` store implementation for marketplace persistence.
//!
//! Conditional writes carry their status expectation in the `WHERE` clause,
//! so the database itself arbitrates racing writers; the coupled
//! accept-bid commit runs both updates in one transaction and aborts when
//! the task row is no longer open.

use super::{
    models::{BidRow, NewBidRow, NewReviewRow, NewTaskRow, ReviewRow, TaskRow},
    schema::{bids, reviews, tasks},
};
use crate::marketplace::{
    domain::{
        Bid, BidId, BidStatus, PersistedBidData, PersistedReviewData, PersistedTaskData, Review,
        ReviewId, Task, TaskDetails, TaskId, TaskStatus, UserId,
    },
    ports::{MarketplaceStore, StoreError, StoreResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by marketplace adapters.
pub type MarketplacePgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed marketplace store.
#[derive(Debug, Clone)]
pub struct PostgresMarketplaceStore {
    pool: MarketplacePgPool,
}

impl PostgresMarketplaceStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: MarketplacePgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(StoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(StoreError::persistence)?
    }
}

/// Error carrier for aborting diesel transactions with a store error.
enum TxError {
    Abort(StoreError),
    Query(DieselError),
}

impl From<DieselError> for TxError {
    fn from(err: DieselError) -> Self {
        Self::Query(err)
    }
}

impl TxError {
    fn into_store(self) -> StoreError {
        match self {
            Self::Abort(err) => err,
            Self::Query(err) => StoreError::persistence(err),
        }
    }
}

#[async_trait]
impl MarketplaceStore for PostgresMarketplaceStore {
    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        let task_id = task.id();
        let new_row = task_to_new_row(task)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(tasks::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        StoreError::DuplicateTask(task_id)
                    }
                    _ => StoreError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update_task_if_status(&self, task: &Task, expected: TaskStatus) -> StoreResult<()> {
        let task = task.clone();
        self.run_blocking(move |connection| {
            let details = details_json(&task)?;
            let updated = diesel::update(
                tasks::table
                    .filter(tasks::id.eq(task.id().into_inner()))
                    .filter(tasks::status.eq(expected.as_str())),
            )
            .set((
                tasks::details.eq(details),
                tasks::status.eq(task.status().as_str()),
                tasks::assigned_to.eq(task.assigned_to().map(UserId::into_inner)),
                tasks::accepted_bid.eq(task.accepted_bid().map(BidId::into_inner)),
                tasks::completion_note.eq(task.completion_note().map(str::to_owned)),
                tasks::completed_at.eq(task.completed_at()),
                tasks::updated_at.eq(task.updated_at()),
            ))
            .execute(connection)
            .map_err(StoreError::persistence)?;

            if updated == 0 {
                return match stored_task_status(connection, task.id())? {
                    None => Err(StoreError::TaskNotFound(task.id())),
                    Some(found) => Err(StoreError::StaleTask {
                        task_id: task.id(),
                        expected,
                        found,
                    }),
                };
            }
            Ok(())
        })
        .await
    }

    async fn find_task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .filter(tasks::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(StoreError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn tasks_by_customer(&self, customer: UserId) -> StoreResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::customer.eq(customer.into_inner()))
                .order(tasks::created_at.asc())
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(StoreError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn tasks_assigned_to(&self, tasker: UserId) -> StoreResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::assigned_to.eq(Some(tasker.into_inner())))
                .order(tasks::created_at.asc())
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(StoreError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn insert_bid(&self, bid: &Bid) -> StoreResult<()> {
        let bid_id = bid.id();
        let new_row = bid_to_new_row(bid)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(bids::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        StoreError::DuplicateBid(bid_id)
                    }
                    _ => StoreError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update_bid_if_status(&self, bid: &Bid, expected: BidStatus) -> StoreResult<()> {
        let bid = bid.clone();
        self.run_blocking(move |connection| {
            let updated = conditional_bid_update(connection, &bid, expected)
                .map_err(StoreError::persistence)?;
            if updated == 0 {
                return match stored_bid_status(connection, bid.id())? {
                    None => Err(StoreError::BidNotFound(bid.id())),
                    Some(found) => Err(StoreError::StaleBid {
                        bid_id: bid.id(),
                        expected,
                        found,
                    }),
                };
            }
            Ok(())
        })
        .await
    }

    async fn find_bid(&self, id: BidId) -> StoreResult<Option<Bid>> {
        self.run_blocking(move |connection| {
            let row = bids::table
                .filter(bids::id.eq(id.into_inner()))
                .select(BidRow::as_select())
                .first::<BidRow>(connection)
                .optional()
                .map_err(StoreError::persistence)?;
            row.map(row_to_bid).transpose()
        })
        .await
    }

    async fn bids_by_task(&self, task_id: TaskId) -> StoreResult<Vec<Bid>> {
        self.run_blocking(move |connection| {
            let rows = bids::table
                .filter(bids::task_id.eq(task_id.into_inner()))
                .order(bids::created_at.asc())
                .select(BidRow::as_select())
                .load::<BidRow>(connection)
                .map_err(StoreError::persistence)?;
            rows.into_iter().map(row_to_bid).collect()
        })
        .await
    }

    async fn bids_by_bidder(&self, bidder: UserId) -> StoreResult<Vec<Bid>> {
        self.run_blocking(move |connection| {
            let rows = bids::table
                .filter(bids::bidder.eq(bidder.into_inner()))
                .order(bids::created_at.asc())
                .select(BidRow::as_select())
                .load::<BidRow>(connection)
                .map_err(StoreError::persistence)?;
            rows.into_iter().map(row_to_bid).collect()
        })
        .await
    }

    async fn pending_bid_for(&self, task_id: TaskId, bidder: UserId) -> StoreResult<Option<Bid>> {
        self.run_blocking(move |connection| {
            let row = bids::table
                .filter(bids::task_id.eq(task_id.into_inner()))
                .filter(bids::bidder.eq(bidder.into_inner()))
                .filter(bids::status.eq(BidStatus::Pending.as_str()))
                .select(BidRow::as_select())
                .first::<BidRow>(connection)
                .optional()
                .map_err(StoreError::persistence)?;
            row.map(row_to_bid).transpose()
        })
        .await
    }

    async fn commit_assignment(&self, task: &Task, accepted: &Bid) -> StoreResult<()> {
        let task = task.clone();
        let accepted = accepted.clone();
        self.run_blocking(move |connection| {
            let details = details_json(&task)?;
            connection
                .transaction::<(), TxError, _>(|conn| {
                    let task_rows = diesel::update(
                        tasks::table
                            .filter(tasks::id.eq(task.id().into_inner()))
                            .filter(tasks::status.eq(TaskStatus::Open.as_str())),
                    )
                    .set((
                        tasks::details.eq(details.clone()),
                        tasks::status.eq(task.status().as_str()),
                        tasks::assigned_to.eq(task.assigned_to().map(UserId::into_inner)),
                        tasks::accepted_bid.eq(task.accepted_bid().map(BidId::into_inner)),
                        tasks::updated_at.eq(task.updated_at()),
                    ))
                    .execute(conn)?;

                    if task_rows == 0 {
                        let found = stored_task_status(conn, task.id()).map_err(TxError::Abort)?;
                        return Err(TxError::Abort(match found {
                            None => StoreError::TaskNotFound(task.id()),
                            Some(_) => StoreError::AssignmentConflict(task.id()),
                        }));
                    }

                    let bid_rows = conditional_bid_update(conn, &accepted, BidStatus::Pending)?;
                    if bid_rows == 0 {
                        let found = stored_bid_status(conn, accepted.id()).map_err(TxError::Abort)?;
                        return Err(TxError::Abort(match found {
                            None => StoreError::BidNotFound(accepted.id()),
                            Some(found) => StoreError::StaleBid {
                                bid_id: accepted.id(),
                                expected: BidStatus::Pending,
                                found,
                            },
                        }));
                    }
                    Ok(())
                })
                .map_err(TxError::into_store)
        })
        .await
    }

    async fn commit_cancellation(&self, task: &Task, cancelled_bids: &[Bid]) -> StoreResult<()> {
        let task = task.clone();
        let cancelled_bids = cancelled_bids.to_vec();
        self.run_blocking(move |connection| {
            let details = details_json(&task)?;
            connection
                .transaction::<(), TxError, _>(|conn| {
                    let task_rows = diesel::update(
                        tasks::table
                            .filter(tasks::id.eq(task.id().into_inner()))
                            .filter(tasks::status.eq(TaskStatus::Open.as_str())),
                    )
                    .set((
                        tasks::details.eq(details.clone()),
                        tasks::status.eq(task.status().as_str()),
                        tasks::updated_at.eq(task.updated_at()),
                    ))
                    .execute(conn)?;

                    if task_rows == 0 {
                        let found = stored_task_status(conn, task.id()).map_err(TxError::Abort)?;
                        return Err(TxError::Abort(match found {
                            None => StoreError::TaskNotFound(task.id()),
                            Some(found) => StoreError::StaleTask {
                                task_id: task.id(),
                                expected: TaskStatus::Open,
                                found,
                            },
                        }));
                    }

                    // Bids decided independently in the race window keep
                    // their decision; the conditional update skips them.
                    for bid in &cancelled_bids {
                        conditional_bid_update(conn, bid, BidStatus::Pending)?;
                    }
                    Ok(())
                })
                .map_err(TxError::into_store)
        })
        .await
    }

    async fn insert_review(&self, review: &Review) -> StoreResult<()> {
        let task_id = review.task_id();
        let reviewer = review.reviewer();
        let new_row = review_to_new_row(review);
        self.run_blocking(move |connection| {
            diesel::insert_into(reviews::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                        if is_reviewer_unique_violation(info.as_ref()) =>
                    {
                        StoreError::DuplicateReview { task_id, reviewer }
                    }
                    _ => StoreError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn reviews_for_task(&self, task_id: TaskId) -> StoreResult<Vec<Review>> {
        self.run_blocking(move |connection| {
            let rows = reviews::table
                .filter(reviews::task_id.eq(task_id.into_inner()))
                .order(reviews::created_at.asc())
                .select(ReviewRow::as_select())
                .load::<ReviewRow>(connection)
                .map_err(StoreError::persistence)?;
            rows.into_iter().map(row_to_review).collect()
        })
        .await
    }
}

/// Applies a bid snapshot guarded by the expected stored status.
fn conditional_bid_update(
    connection: &mut PgConnection,
    bid: &Bid,
    expected: BidStatus,
) -> Result<usize, DieselError> {
    diesel::update(
        bids::table
            .filter(bids::id.eq(bid.id().into_inner()))
            .filter(bids::status.eq(expected.as_str())),
    )
    .set((
        bids::amount.eq(amount_to_column(bid)),
        bids::message.eq(bid.message().to_owned()),
        bids::estimated_days.eq(bid.estimated_days().map(days_to_column)),
        bids::status.eq(bid.status().as_str()),
        bids::rejection_reason.eq(bid.rejection_reason().map(str::to_owned)),
        bids::updated_at.eq(bid.updated_at()),
    ))
    .execute(connection)
}

fn stored_task_status(
    connection: &mut PgConnection,
    task_id: TaskId,
) -> StoreResult<Option<TaskStatus>> {
    let status = tasks::table
        .filter(tasks::id.eq(task_id.into_inner()))
        .select(tasks::status)
        .first::<String>(connection)
        .optional()
        .map_err(StoreError::persistence)?;
    status
        .map(|value| TaskStatus::try_from(value.as_str()).map_err(StoreError::persistence))
        .transpose()
}

fn stored_bid_status(
    connection: &mut PgConnection,
    bid_id: BidId,
) -> StoreResult<Option<BidStatus>> {
    let status = bids::table
        .filter(bids::id.eq(bid_id.into_inner()))
        .select(bids::status)
        .first::<String>(connection)
        .optional()
        .map_err(StoreError::persistence)?;
    status
        .map(|value| BidStatus::try_from(value.as_str()).map_err(StoreError::persistence))
        .transpose()
}

fn details_json(task: &Task) -> StoreResult<serde_json::Value> {
    serde_json::to_value(task.details()).map_err(StoreError::persistence)
}

/// Amounts are validated to fit `i64` at construction; the fallback keeps
/// the conversion total without a panic path.
fn amount_to_column(bid: &Bid) -> i64 {
    i64::try_from(bid.amount().value()).unwrap_or(i64::MAX)
}

fn days_to_column(days: u32) -> i32 {
    i32::try_from(days).unwrap_or(i32::MAX)
}

pub(crate) fn task_to_new_row(task: &Task) -> StoreResult<NewTaskRow> {
    Ok(NewTaskRow {
        id: task.id().into_inner(),
        customer: task.customer().into_inner(),
        details: details_json(task)?,
        status: task.status().as_str().to_owned(),
        assigned_to: task.assigned_to().map(UserId::into_inner),
        accepted_bid: task.accepted_bid().map(BidId::into_inner),
        completion_note: task.completion_note().map(str::to_owned),
        completed_at: task.completed_at(),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    })
}

pub(crate) fn row_to_task(row: TaskRow) -> StoreResult<Task> {
    let TaskRow {
        id,
        customer,
        details: persisted_details,
        status: persisted_status,
        assigned_to,
        accepted_bid,
        completion_note,
        completed_at,
        created_at,
        updated_at,
    } = row;

    let details = serde_json::from_value::<TaskDetails>(persisted_details)
        .map_err(StoreError::persistence)?;
    let status =
        TaskStatus::try_from(persisted_status.as_str()).map_err(StoreError::persistence)?;

    let data = PersistedTaskData {
        id: TaskId::from_uuid(id),
        customer: UserId::from_uuid(customer),
        details,
        status,
        assigned_to: assigned_to.map(UserId::from_uuid),
        accepted_bid: accepted_bid.map(BidId::from_uuid),
        completion_note,
        completed_at,
        created_at,
        updated_at,
    };
    Ok(Task::from_persisted(data))
}

pub(crate) fn bid_to_new_row(bid: &Bid) -> StoreResult<NewBidRow> {
    Ok(NewBidRow {
        id: bid.id().into_inner(),
        task_id: bid.task_id().into_inner(),
        bidder: bid.bidder().into_inner(),
        amount: i64::try_from(bid.amount().value()).map_err(StoreError::persistence)?,
        message: bid.message().to_owned(),
        estimated_days: bid.estimated_days().map(days_to_column),
        status: bid.status().as_str().to_owned(),
        rejection_reason: bid.rejection_reason().map(str::to_owned),
        created_at: bid.created_at(),
        updated_at: bid.updated_at(),
    })
}

pub(crate) fn row_to_bid(row: BidRow) -> StoreResult<Bid> {
    let BidRow {
        id,
        task_id,
        bidder,
        amount: persisted_amount,
        message,
        estimated_days,
        status: persisted_status,
        rejection_reason,
        created_at,
        updated_at,
    } = row;

    let amount_value = u64::try_from(persisted_amount).map_err(StoreError::persistence)?;
    let amount = crate::marketplace::domain::Amount::new(amount_value)
        .map_err(|err| StoreError::persistence(std::io::Error::other(err.to_string())))?;
    let status = BidStatus::try_from(persisted_status.as_str()).map_err(StoreError::persistence)?;
    let estimated_days = estimated_days
        .map(|days| u32::try_from(days).map_err(StoreError::persistence))
        .transpose()?;

    let data = PersistedBidData {
        id: BidId::from_uuid(id),
        task_id: TaskId::from_uuid(task_id),
        bidder: UserId::from_uuid(bidder),
        amount,
        message,
        estimated_days,
        status,
        rejection_reason,
        created_at,
        updated_at,
    };
    Ok(Bid::from_persisted(data))
}

pub(crate) fn review_to_new_row(review: &Review) -> NewReviewRow {
    NewReviewRow {
        id: review.id().into_inner(),
        task_id: review.task_id().into_inner(),
        reviewer: review.reviewer().into_inner(),
        rating: i16::from(review.rating()),
        comment: review.comment().to_owned(),
        created_at: review.created_at(),
    }
}

pub(crate) fn row_to_review(row: ReviewRow) -> StoreResult<Review> {
    let rating = u8::try_from(row.rating).map_err(StoreError::persistence)?;
    let data = PersistedReviewData {
        id: ReviewId::from_uuid(row.id),
        task_id: TaskId::from_uuid(row.task_id),
        reviewer: UserId::from_uuid(row.reviewer),
        rating,
        comment: row.comment,
        created_at: row.created_at,
    };
    Ok(Review::from_persisted(data))
}

fn is_reviewer_unique_violation(info: &dyn DatabaseErrorInformation) -> bool {
    info.constraint_name()
        .is_some_and(|name| name == "idx_reviews_task_reviewer_unique")
}
