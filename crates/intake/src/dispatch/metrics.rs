use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use formgate_shared::dispatch::Target;
use serde::Serialize;

#[derive(Debug, Default)]
struct TargetCounters {
    attempts: AtomicU64,
    failures: AtomicU64,
}

/// Dispatch counters shared by every clone of the queue.
#[derive(Debug, Clone, Default)]
pub struct DispatchMetrics {
    accepted: Arc<AtomicU64>,
    delivered: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    duplicates: Arc<AtomicU64>,
    notification: Arc<TargetCounters>,
    storage: Arc<TargetCounters>,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn target(&self, target: Target) -> &TargetCounters {
        match target {
            Target::Notification => &self.notification,
            Target::RecordStore => &self.storage,
        }
    }

    pub fn track_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn track_attempt(&self, target: Target, success: bool) {
        let counters = self.target(target);
        counters.attempts.fetch_add(1, Ordering::Relaxed);
        if !success {
            counters.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            notification_attempts: self.notification.attempts.load(Ordering::Relaxed),
            notification_failures: self.notification.failures.load(Ordering::Relaxed),
            storage_attempts: self.storage.attempts.load(Ordering::Relaxed),
            storage_failures: self.storage.failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub accepted: u64,
    pub delivered: u64,
    pub failed: u64,
    pub duplicates: u64,
    pub notification_attempts: u64,
    pub notification_failures: u64,
    pub storage_attempts: u64,
    pub storage_failures: u64,
}
