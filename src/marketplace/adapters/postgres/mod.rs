//! `PostgreSQL` adapter for marketplace persistence.

pub mod models;
pub mod schema;

mod repository;

pub use repository::{MarketplacePgPool, PostgresMarketplaceStore};

#[cfg(test)]
pub(crate) use repository::{
    bid_to_new_row, review_to_new_row, row_to_bid, row_to_review, row_to_task, task_to_new_row,
};
