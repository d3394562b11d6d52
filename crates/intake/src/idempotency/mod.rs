//! Collapses resubmissions of the same form into a single dispatch.
//!
//! Every admitted submission claims an [`IdempotencyKey`] in a [`KeyStore`].
//! The key is a SHA3-256 digest of the form type, the canonical submission
//! content and either the client's nonce (`Idempotency-Key` header) or the
//! current time bucket. A second submission that derives the same key while
//! the first claim is alive is answered with [`Duplicate`] and the status of
//! the original dispatch.
//!
//! A claim whose holder never wrote its Pending record (the process died
//! between the two writes) is taken over once it is older than
//! [`GuardConfig::orphan_after`].

mod sqlite;
mod store;

use std::{fmt, sync::Arc, time::Duration};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use formgate_shared::dispatch::{DispatchRecord, DispatchStatus, SubmissionId};
use formgate_shared::form::FormSubmission;
use sha3::{Digest, Sha3_256};

use crate::{Clock, DispatchLog};

pub use sqlite::SqliteKeyStore;
pub use store::{KeyClaim, KeyStore, MemoryKeyStore};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_ORPHAN_AFTER: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn derive(
        submission: &FormSubmission,
        client_key: Option<&str>,
        now: u64,
        window: Duration,
    ) -> formgate_shared::Result<Self> {
        let mut hasher = Sha3_256::new();
        hasher.update(submission.form_type().as_ref().as_bytes());
        hasher.update([0u8]);
        hasher.update(submission.canonical_bytes()?);
        hasher.update([0u8]);

        match client_key {
            Some(nonce) => {
                hasher.update(b"nonce:");
                hasher.update(nonce.as_bytes());
            }
            None => {
                let bucket = now / window.as_secs().max(1);
                hasher.update(format!("bucket:{bucket}").as_bytes());
            }
        }

        Ok(Self(URL_SAFE_NO_PAD.encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuardConfig {
    /// Width of the time bucket used when the client sends no nonce.
    pub window: Duration,
    /// How long a claimed key keeps answering with `Duplicate`.
    pub retention: Duration,
    /// Age after which a claim without a dispatch record is considered abandoned.
    pub orphan_after: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            retention: DEFAULT_RETENTION,
            orphan_after: DEFAULT_ORPHAN_AFTER,
        }
    }
}

/// Proof that a submission was admitted and its Pending record exists.
#[derive(Clone, Debug)]
pub struct AdmissionTicket {
    pub key: IdempotencyKey,
    pub record: DispatchRecord,
}

impl AdmissionTicket {
    pub fn submission_id(&self) -> &SubmissionId {
        &self.record.submission_id
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Duplicate {
    pub submission_id: SubmissionId,
    pub status: DispatchStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum AdmitError {
    #[error("duplicate of submission {}", .0.submission_id)]
    Duplicate(Duplicate),

    #[error(transparent)]
    Internal(#[from] formgate_shared::Error),
}

#[derive(Clone)]
pub struct IdempotencyGuard {
    keys: Arc<dyn KeyStore>,
    log: Arc<dyn DispatchLog>,
    clock: Arc<dyn Clock>,
    config: GuardConfig,
}

impl IdempotencyGuard {
    pub fn new(
        keys: Arc<dyn KeyStore>,
        log: Arc<dyn DispatchLog>,
        clock: Arc<dyn Clock>,
        config: GuardConfig,
    ) -> Self {
        Self {
            keys,
            log,
            clock,
            config,
        }
    }

    pub async fn admit(
        &self,
        submission: FormSubmission,
        client_key: Option<&str>,
    ) -> Result<AdmissionTicket, AdmitError> {
        let now = self.clock.now();
        let key = IdempotencyKey::derive(&submission, client_key, now, self.config.window)?;
        let submission_id = SubmissionId::new();
        let expires_at = now + self.config.retention.as_secs();

        loop {
            let claim = self
                .keys
                .check_and_insert(&key, &submission_id, now, expires_at)
                .await?;

            let KeyClaim::Held {
                submission_id: prior,
                claimed_at,
            } = claim
            else {
                return self.record_pending(key, submission_id, submission, now).await;
            };

            let record = self.log.get(&prior).await?;
            let orphaned =
                record.is_none() && now >= claimed_at + self.config.orphan_after.as_secs();

            if orphaned {
                if self
                    .keys
                    .take_over(&key, &prior, &submission_id, now, expires_at)
                    .await?
                {
                    tracing::warn!(
                        key = %key,
                        orphaned_submission_id = %prior,
                        submission_id = %submission_id,
                        "Took over orphaned idempotency key"
                    );

                    return self.record_pending(key, submission_id, submission, now).await;
                }

                // Another admission took it over first.
                continue;
            }

            // The holder may still be between its claim and its record insert.
            let status = record.map(|record| record.status).unwrap_or_default();

            tracing::info!(
                submission_id = %prior,
                status = %status,
                form_type = %submission.form_type(),
                "Duplicate submission collapsed"
            );

            return Err(AdmitError::Duplicate(Duplicate {
                submission_id: prior,
                status,
            }));
        }
    }

    async fn record_pending(
        &self,
        key: IdempotencyKey,
        submission_id: SubmissionId,
        submission: FormSubmission,
        now: u64,
    ) -> Result<AdmissionTicket, AdmitError> {
        let record = DispatchRecord::pending(submission_id, submission, now);

        if let Err(err) = self.log.insert(&record).await {
            if let Err(release_err) = self.keys.release(&key, &record.submission_id).await {
                tracing::error!(
                    error = %release_err,
                    key = %key,
                    "Failed to release idempotency key after record insert failure"
                );
            }

            return Err(err.into());
        }

        tracing::info!(
            submission_id = %record.submission_id,
            form_type = %record.form_type,
            "Submission admitted"
        );

        Ok(AdmissionTicket { key, record })
    }

    /// Drops keys whose retention has elapsed.
    pub async fn evict_expired(&self) -> formgate_shared::Result<u64> {
        let evicted = self.keys.evict_expired(self.clock.now()).await?;
        if evicted > 0 {
            tracing::info!(evicted, "Evicted expired idempotency keys");
        }

        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formgate_shared::form::{ContactRequest, QuoteRequest};

    fn contact(message: &str) -> FormSubmission {
        FormSubmission::Contact(ContactRequest {
            name: "A".to_owned(),
            email: "a@b.com".to_owned(),
            phone: "555".to_owned(),
            subject: "S".to_owned(),
            message: message.to_owned(),
        })
    }

    #[test]
    fn same_bucket_same_key() {
        let window = Duration::from_secs(300);
        let first = IdempotencyKey::derive(&contact("M"), None, 600, window).unwrap();
        let second = IdempotencyKey::derive(&contact("M"), None, 899, window).unwrap();
        let later = IdempotencyKey::derive(&contact("M"), None, 900, window).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, later);
    }

    #[test]
    fn content_and_nonce_change_the_key() {
        let window = Duration::from_secs(300);
        let base = IdempotencyKey::derive(&contact("M"), None, 0, window).unwrap();

        assert_ne!(
            base,
            IdempotencyKey::derive(&contact("N"), None, 0, window).unwrap()
        );
        assert_ne!(
            base,
            IdempotencyKey::derive(&contact("M"), Some("tab-1"), 0, window).unwrap()
        );
        assert_eq!(
            IdempotencyKey::derive(&contact("M"), Some("tab-1"), 0, window).unwrap(),
            IdempotencyKey::derive(&contact("M"), Some("tab-1"), 86_000, window).unwrap()
        );
    }

    #[test]
    fn form_type_is_part_of_the_key() {
        let window = Duration::from_secs(300);
        let quote = FormSubmission::Quote(QuoteRequest::default());
        let key = IdempotencyKey::derive(&quote, None, 0, window).unwrap();

        assert_eq!(key.as_str().len(), 43);
        assert_ne!(
            key,
            IdempotencyKey::derive(&contact("M"), None, 0, window).unwrap()
        );
    }
}
