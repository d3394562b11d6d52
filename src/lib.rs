pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod observability;
pub mod routes;

use std::sync::Arc;

pub use routes::{AppState, router};

use formgate_intake::{
    Clock, DispatchQueue, IdempotencyGuard, Intake, NotificationSender, QuoteSchema,
    RetryPolicy, SqliteDispatchLog, SqliteKeyStore, SqliteRecordStore, SystemClock, Validator,
};
use sqlx::SqlitePool;

/// Wire the intake pipeline onto the write pool
///
/// The notification sender is injected so tests can swap the SMTP service
/// for a scripted one.
pub fn create_intake(
    config: &config::Config,
    write_pool: SqlitePool,
    notifier: Arc<dyn NotificationSender>,
) -> Intake {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let log = Arc::new(SqliteDispatchLog::new(write_pool.clone()));
    let keys = Arc::new(SqliteKeyStore::new(write_pool.clone()));
    let store = Arc::new(SqliteRecordStore::new(write_pool, clock.clone()));

    let guard = IdempotencyGuard::new(
        keys,
        log.clone(),
        clock.clone(),
        (&config.idempotency).into(),
    );
    let queue = DispatchQueue::new(
        log,
        notifier,
        store,
        clock,
        RetryPolicy::from(&config.dispatch),
    );
    let validator = Validator::new(QuoteSchema::new(
        config.forms.quote_required_fields.iter().cloned(),
    ));

    Intake::new(validator, guard, queue).admission_timeout(config.server.admission_timeout())
}
