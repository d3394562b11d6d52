use std::time::Duration;

use formgate_shared::dispatch::SubmissionId;
use formgate_shared::form::{FormType, ValidationError};

use crate::{AdmitError, DispatchQueue, Duplicate, IdempotencyGuard, RawPayload, Validator};

/// Result of a submission that passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submitted {
    /// Admitted and handed to the dispatch queue.
    Accepted(SubmissionId),
    Duplicate(Duplicate),
}

impl Submitted {
    pub fn submission_id(&self) -> &SubmissionId {
        match self {
            Self::Accepted(submission_id) => submission_id,
            Self::Duplicate(duplicate) => &duplicate.submission_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("admission timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Internal(#[from] formgate_shared::Error),
}

/// Validator, idempotency guard and dispatch queue wired in request order.
#[derive(Clone)]
pub struct Intake {
    validator: Validator,
    guard: IdempotencyGuard,
    queue: DispatchQueue,
    admission_timeout: Option<Duration>,
}

impl Intake {
    pub fn new(validator: Validator, guard: IdempotencyGuard, queue: DispatchQueue) -> Self {
        Self {
            validator,
            guard,
            queue,
            admission_timeout: None,
        }
    }

    /// Bounds how long a caller waits for the dedup check and record insert.
    ///
    /// Admission itself runs on its own task and is never cut short, so a
    /// timed out submission still ends up claimed and recorded.
    pub fn admission_timeout(mut self, timeout: Duration) -> Self {
        self.admission_timeout = Some(timeout);
        self
    }

    pub fn guard(&self) -> &IdempotencyGuard {
        &self.guard
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    pub async fn submit(
        &self,
        raw: &RawPayload,
        form_type: FormType,
        client_key: Option<&str>,
    ) -> Result<Submitted, SubmitError> {
        let submission = self.validator.validate(raw, form_type).inspect_err(|err| {
            tracing::info!(form_type = %form_type, field = err.field(), "Submission rejected");
        })?;

        let guard = self.guard.clone();
        let queue = self.queue.clone();
        let client_key = client_key.map(str::to_owned);
        let admission = tokio::spawn(async move {
            match guard.admit(submission, client_key.as_deref()).await {
                Ok(ticket) => Ok(Submitted::Accepted(queue.enqueue(ticket))),
                Err(AdmitError::Duplicate(duplicate)) => {
                    queue.metrics().track_duplicate();
                    Ok(Submitted::Duplicate(duplicate))
                }
                Err(AdmitError::Internal(err)) => Err(SubmitError::Internal(err)),
            }
        });

        // Dropping the handle on timeout detaches the task.
        let joined = match self.admission_timeout {
            Some(timeout) => tokio::time::timeout(timeout, admission)
                .await
                .map_err(|_| {
                    tracing::warn!(
                        form_type = %form_type,
                        timeout_ms = timeout.as_millis() as u64,
                        "Submission admission timed out, finishing in background"
                    );
                    SubmitError::Timeout(timeout)
                })?,
            None => admission.await,
        };

        joined.map_err(|err| formgate_shared::Error::Unknown(err.into()))?
    }
}
