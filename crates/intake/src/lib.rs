mod clock;
mod collaborator;
pub mod dispatch;
pub mod idempotency;
mod intake;
mod record_store;
mod validate;

pub use clock::*;
pub use collaborator::*;
pub use dispatch::{
    DispatchLog, DispatchMetrics, DispatchQueue, MemoryDispatchLog,
    MetricsSnapshot, RetryPolicy, SqliteDispatchLog,
};
pub use idempotency::{
    AdmissionTicket, AdmitError, Duplicate, GuardConfig, IdempotencyGuard, IdempotencyKey,
    KeyClaim, KeyStore, MemoryKeyStore, SqliteKeyStore,
};
pub use intake::*;
pub use record_store::*;
pub use validate::*;
