mod contact_submissions_create_table;
mod dispatch_records_create_status_idx;
mod dispatch_records_create_table;
mod idempotency_keys_create_expires_at_idx;
mod idempotency_keys_create_table;
mod quote_submissions_create_table;

use sqlx_migrator::vec_box;

pub struct Migration;

sqlx_migrator::sqlite_migration!(
    Migration,
    "main",
    "m0001",
    vec_box![],
    vec_box![
        idempotency_keys_create_table::Operation,
        idempotency_keys_create_expires_at_idx::Operation,
        dispatch_records_create_table::Operation,
        dispatch_records_create_status_idx::Operation,
        contact_submissions_create_table::Operation,
        quote_submissions_create_table::Operation,
    ]
);
