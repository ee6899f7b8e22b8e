//! Diesel schema for marketplace persistence.

diesel::table! {
    /// Task records with customer-editable details stored as JSONB.
    tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Owning customer.
        customer -> Uuid,
        /// Editable fields payload (title, budget, address, ...).
        details -> Jsonb,
        /// Task lifecycle status.
        #[max_length = 50]
        status -> Varchar,
        /// Assigned tasker, present iff the status requires one.
        assigned_to -> Nullable<Uuid>,
        /// Accepted bid, present iff the task is assigned or beyond.
        accepted_bid -> Nullable<Uuid>,
        /// Latest completion note from the assigned tasker.
        completion_note -> Nullable<Text>,
        /// Completion timestamp.
        completed_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Bid records, one row per (task, tasker) proposal.
    bids (id) {
        /// Bid identifier.
        id -> Uuid,
        /// Owning task.
        task_id -> Uuid,
        /// Bidding tasker.
        bidder -> Uuid,
        /// Bid amount in whole currency units.
        amount -> Int8,
        /// Message to the customer.
        message -> Text,
        /// Estimated days to completion.
        estimated_days -> Nullable<Int4>,
        /// Bid lifecycle status.
        #[max_length = 50]
        status -> Varchar,
        /// Reason recorded when the customer rejected the bid.
        rejection_reason -> Nullable<Text>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Review records, at most one per (task, reviewer) pair.
    reviews (id) {
        /// Review identifier.
        id -> Uuid,
        /// Reviewed task.
        task_id -> Uuid,
        /// Reviewing participant.
        reviewer -> Uuid,
        /// Rating in 1..=5.
        rating -> Int2,
        /// Free-text comment.
        comment -> Text,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(tasks, bids, reviews);
