use std::collections::HashMap;

use async_trait::async_trait;
use formgate_shared::dispatch::SubmissionId;
use tokio::sync::Mutex;

use super::IdempotencyKey;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyClaim {
    /// The key was free (or expired) and now belongs to the caller.
    Claimed,
    /// A live claim already exists for this submission.
    Held {
        submission_id: SubmissionId,
        claimed_at: u64,
    },
}

/// Storage for idempotency keys. `check_and_insert` must be atomic per key.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn check_and_insert(
        &self,
        key: &IdempotencyKey,
        submission_id: &SubmissionId,
        now: u64,
        expires_at: u64,
    ) -> formgate_shared::Result<KeyClaim>;

    /// Hand a live claim over to `submission_id`, only if it still belongs to
    /// `holder`. Returns whether the swap happened.
    async fn take_over(
        &self,
        key: &IdempotencyKey,
        holder: &SubmissionId,
        submission_id: &SubmissionId,
        now: u64,
        expires_at: u64,
    ) -> formgate_shared::Result<bool>;

    /// Undo a claim, only if it still belongs to `submission_id`.
    async fn release(
        &self,
        key: &IdempotencyKey,
        submission_id: &SubmissionId,
    ) -> formgate_shared::Result<()>;

    async fn evict_expired(&self, now: u64) -> formgate_shared::Result<u64>;
}

#[derive(Clone, Debug)]
struct Entry {
    submission_id: SubmissionId,
    claimed_at: u64,
    expires_at: u64,
}

#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    entries: Mutex<HashMap<IdempotencyKey, Entry>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn check_and_insert(
        &self,
        key: &IdempotencyKey,
        submission_id: &SubmissionId,
        now: u64,
        expires_at: u64,
    ) -> formgate_shared::Result<KeyClaim> {
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get(key) {
            if entry.expires_at > now {
                return Ok(KeyClaim::Held {
                    submission_id: entry.submission_id.clone(),
                    claimed_at: entry.claimed_at,
                });
            }
        }

        entries.insert(
            key.clone(),
            Entry {
                submission_id: submission_id.clone(),
                claimed_at: now,
                expires_at,
            },
        );

        Ok(KeyClaim::Claimed)
    }

    async fn take_over(
        &self,
        key: &IdempotencyKey,
        holder: &SubmissionId,
        submission_id: &SubmissionId,
        now: u64,
        expires_at: u64,
    ) -> formgate_shared::Result<bool> {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(key) else {
            return Ok(false);
        };

        if &entry.submission_id != holder {
            return Ok(false);
        }

        *entry = Entry {
            submission_id: submission_id.clone(),
            claimed_at: now,
            expires_at,
        };

        Ok(true)
    }

    async fn release(
        &self,
        key: &IdempotencyKey,
        submission_id: &SubmissionId,
    ) -> formgate_shared::Result<()> {
        let mut entries = self.entries.lock().await;
        if entries
            .get(key)
            .is_some_and(|entry| &entry.submission_id == submission_id)
        {
            entries.remove(key);
        }

        Ok(())
    }

    async fn evict_expired(&self, now: u64) -> formgate_shared::Result<u64> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);

        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(value: &str) -> IdempotencyKey {
        IdempotencyKey(value.to_owned())
    }

    #[tokio::test]
    async fn claim_then_hold_until_expiry() -> anyhow::Result<()> {
        let store = MemoryKeyStore::new();
        let first = SubmissionId::new();
        let second = SubmissionId::new();

        assert_eq!(
            store.check_and_insert(&key("k"), &first, 100, 200).await?,
            KeyClaim::Claimed
        );
        assert_eq!(
            store.check_and_insert(&key("k"), &second, 199, 299).await?,
            KeyClaim::Held {
                submission_id: first.clone(),
                claimed_at: 100,
            }
        );
        assert_eq!(
            store.check_and_insert(&key("k"), &second, 200, 300).await?,
            KeyClaim::Claimed
        );

        Ok(())
    }

    #[tokio::test]
    async fn release_only_drops_own_claim() -> anyhow::Result<()> {
        let store = MemoryKeyStore::new();
        let owner = SubmissionId::new();

        store.check_and_insert(&key("k"), &owner, 0, 10).await?;
        store.release(&key("k"), &SubmissionId::new()).await?;
        assert_eq!(store.len().await, 1);

        store.release(&key("k"), &owner).await?;
        assert!(store.is_empty().await);

        Ok(())
    }

    #[tokio::test]
    async fn take_over_swaps_only_the_expected_holder() -> anyhow::Result<()> {
        let store = MemoryKeyStore::new();
        let stale = SubmissionId::new();
        let first = SubmissionId::new();
        let second = SubmissionId::new();

        store.check_and_insert(&key("k"), &stale, 0, 1000).await?;

        assert!(store.take_over(&key("k"), &stale, &first, 100, 1100).await?);
        assert!(!store.take_over(&key("k"), &stale, &second, 100, 1100).await?);
        assert!(!store.take_over(&key("missing"), &stale, &second, 100, 1100).await?);
        assert_eq!(
            store.check_and_insert(&key("k"), &second, 101, 1101).await?,
            KeyClaim::Held {
                submission_id: first,
                claimed_at: 100,
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn evicts_only_expired_keys() -> anyhow::Result<()> {
        let store = MemoryKeyStore::new();
        store
            .check_and_insert(&key("old"), &SubmissionId::new(), 0, 10)
            .await?;
        store
            .check_and_insert(&key("new"), &SubmissionId::new(), 0, 100)
            .await?;

        assert_eq!(store.evict_expired(50).await?, 1);
        assert_eq!(store.len().await, 1);

        Ok(())
    }
}
