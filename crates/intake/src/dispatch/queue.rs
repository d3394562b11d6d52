use std::{sync::Arc, time::Duration};

use formgate_shared::dispatch::{
    DeliveryError, DispatchRecord, DispatchStatus, SubmissionId, Target,
};
use formgate_shared::form::FormSubmission;
use tokio::sync::{Mutex, watch};

use super::{DispatchLog, DispatchMetrics};
use crate::{AdmissionTicket, Clock, Notification, NotificationSender, RecordStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per target, the first one included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
}

impl RetryPolicy {
    /// Delay slept after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            multiplier: 4,
        }
    }
}

#[derive(Clone)]
pub struct DispatchQueue {
    inner: Arc<Inner>,
}

struct Inner {
    log: Arc<dyn DispatchLog>,
    notifier: Arc<dyn NotificationSender>,
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    metrics: DispatchMetrics,
    in_flight: watch::Sender<usize>,
}

/// Decrements the in-flight count even if a delivery task panics.
struct InFlight(Arc<Inner>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.send_modify(|count| *count = count.saturating_sub(1));
    }
}

impl DispatchQueue {
    pub fn new(
        log: Arc<dyn DispatchLog>,
        notifier: Arc<dyn NotificationSender>,
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        let (in_flight, _) = watch::channel(0);

        Self {
            inner: Arc::new(Inner {
                log,
                notifier,
                store,
                clock,
                policy,
                metrics: DispatchMetrics::new(),
                in_flight,
            }),
        }
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.inner.metrics
    }

    pub fn log(&self) -> &Arc<dyn DispatchLog> {
        &self.inner.log
    }

    /// Returns as soon as delivery is scheduled.
    pub fn enqueue(&self, ticket: AdmissionTicket) -> SubmissionId {
        let record = ticket.record;
        let submission_id = record.submission_id.clone();

        self.inner.metrics.track_accepted();
        self.spawn(record);

        submission_id
    }

    /// Re-schedules every Pending record, e.g. after a restart.
    pub async fn recover(&self) -> formgate_shared::Result<usize> {
        let pending = self.inner.log.pending().await?;
        let count = pending.len();

        for record in pending {
            tracing::info!(
                submission_id = %record.submission_id,
                attempts = record.attempts,
                "Recovering pending dispatch"
            );
            self.spawn(record);
        }

        Ok(count)
    }

    /// Resolves once no delivery task is running.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.in_flight.subscribe();
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    pub fn in_flight(&self) -> usize {
        *self.inner.in_flight.borrow()
    }

    fn spawn(&self, record: DispatchRecord) {
        self.inner.in_flight.send_modify(|count| *count += 1);
        let guard = InFlight(self.inner.clone());

        tokio::spawn(async move {
            let inner = guard.0.clone();
            inner.run(record).await;
            drop(guard);
        });
    }
}

impl Inner {
    async fn run(&self, record: DispatchRecord) {
        let submission_id = record.submission_id.clone();
        let payload = record.payload.clone();
        let record = Mutex::new(record);

        tokio::join!(
            self.deliver(Target::Notification, &submission_id, &payload, &record),
            self.deliver(Target::RecordStore, &submission_id, &payload, &record),
        );

        let record = record.into_inner();
        match record.status {
            DispatchStatus::Delivered => {
                self.metrics.track_delivered();
                tracing::info!(
                    submission_id = %submission_id,
                    attempts = record.attempts,
                    "Submission delivered"
                );
            }
            DispatchStatus::Failed => {
                self.metrics.track_failed();
                tracing::error!(
                    submission_id = %submission_id,
                    attempts = record.attempts,
                    last_error = record.last_error.as_deref().unwrap_or_default(),
                    "Submission dispatch failed"
                );
            }
            DispatchStatus::Pending => {
                tracing::warn!(
                    submission_id = %submission_id,
                    "Dispatch ended with pending targets"
                );
            }
        }
    }

    async fn deliver(
        &self,
        target: Target,
        submission_id: &SubmissionId,
        payload: &FormSubmission,
        record: &Mutex<DispatchRecord>,
    ) {
        if record.lock().await.target(target).status.is_terminal() {
            return;
        }

        loop {
            let result = self.attempt(target, submission_id, payload).await;
            let mut current = record.lock().await;
            let attempt = current.target(target).attempts + 1;
            let now = self.clock.now();

            let retry_in = match result {
                Ok(()) => {
                    self.metrics.track_attempt(target, true);
                    current.record_success(target, now);
                    None
                }
                Err(err) => {
                    self.metrics.track_attempt(target, false);
                    let exhausted = !err.is_transient() || attempt >= self.policy.max_attempts;
                    current.record_failure(target, &err, exhausted, now);

                    if exhausted {
                        tracing::error!(
                            submission_id = %submission_id,
                            target = %target,
                            attempt,
                            error = %err,
                            "Delivery target failed"
                        );
                        None
                    } else {
                        let backoff = self.policy.backoff(attempt);
                        tracing::warn!(
                            submission_id = %submission_id,
                            target = %target,
                            attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %err,
                            "Delivery attempt failed, retrying"
                        );
                        Some(backoff)
                    }
                }
            };

            if let Err(err) = self.log.update(&current).await {
                tracing::error!(
                    submission_id = %submission_id,
                    target = %target,
                    error = %err,
                    "Failed to persist dispatch progress"
                );
            }
            drop(current);

            match retry_in {
                Some(backoff) => tokio::time::sleep(backoff).await,
                None => return,
            }
        }
    }

    async fn attempt(
        &self,
        target: Target,
        submission_id: &SubmissionId,
        payload: &FormSubmission,
    ) -> Result<(), DeliveryError> {
        match target {
            Target::Notification => {
                let message = Notification {
                    submission_id: submission_id.clone(),
                    submission: payload.clone(),
                };
                self.notifier.send(&message).await
            }
            Target::RecordStore => {
                let record_id = self.store.persist(submission_id, payload).await?;
                tracing::debug!(
                    submission_id = %submission_id,
                    record_id = %record_id,
                    "Submission stored"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_geometrically() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(16));
    }
}
