use axum::{
    Router,
    routing::{get, post},
};
use formgate_intake::Intake;
use sqlx::SqlitePool;

pub mod contact;
pub mod health;
pub mod metrics;
pub mod quote;
pub mod submission;

mod idempotency_key;

pub use idempotency_key::{IdempotencyKeyHeader, MAX_IDEMPOTENCY_KEY_LEN};

#[derive(Clone)]
pub struct AppState {
    pub intake: Intake,
    pub pool: SqlitePool,
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .with_state(app_state.pool.clone())
        .route("/contact", post(contact::submit))
        .route("/quote", post(quote::submit))
        .route("/submissions/{id}", get(submission::show))
        .route("/metrics", get(metrics::show))
        .with_state(app_state)
}
