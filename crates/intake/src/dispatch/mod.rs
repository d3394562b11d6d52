//! Background delivery of admitted submissions.
//!
//! The queue acknowledges a ticket as soon as it is accepted and delivers to
//! the notification sender and the record store on separate tasks, retrying
//! transient failures with exponential backoff. Progress is written to a
//! [`DispatchLog`] after every attempt so Pending work can be recovered.

mod log;
mod metrics;
mod queue;
mod sqlite;

pub use log::{DispatchLog, MemoryDispatchLog};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use queue::{DispatchQueue, RetryPolicy};
pub use sqlite::SqliteDispatchLog;
