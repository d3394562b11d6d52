use std::collections::HashMap;

use async_trait::async_trait;
use formgate_shared::dispatch::{DispatchRecord, DispatchStatus, SubmissionId};
use tokio::sync::RwLock;

/// Durable home of dispatch records.
#[async_trait]
pub trait DispatchLog: Send + Sync {
    /// Fails if a record with the same submission id already exists.
    async fn insert(&self, record: &DispatchRecord) -> formgate_shared::Result<()>;

    async fn get(&self, id: &SubmissionId) -> formgate_shared::Result<Option<DispatchRecord>>;

    async fn update(&self, record: &DispatchRecord) -> formgate_shared::Result<()>;

    /// Every record still Pending, oldest first.
    async fn pending(&self) -> formgate_shared::Result<Vec<DispatchRecord>>;
}

#[derive(Debug, Default)]
pub struct MemoryDispatchLog {
    records: RwLock<HashMap<SubmissionId, DispatchRecord>>,
}

impl MemoryDispatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DispatchLog for MemoryDispatchLog {
    async fn insert(&self, record: &DispatchRecord) -> formgate_shared::Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.submission_id) {
            formgate_shared::bail!("dispatch record {} already exists", record.submission_id);
        }

        records.insert(record.submission_id.clone(), record.clone());

        Ok(())
    }

    async fn get(&self, id: &SubmissionId) -> formgate_shared::Result<Option<DispatchRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn update(&self, record: &DispatchRecord) -> formgate_shared::Result<()> {
        let mut records = self.records.write().await;
        let Some(current) = records.get_mut(&record.submission_id) else {
            formgate_shared::bail!("dispatch record {} not found", record.submission_id);
        };

        *current = record.clone();

        Ok(())
    }

    async fn pending(&self) -> formgate_shared::Result<Vec<DispatchRecord>> {
        let mut pending = self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.status == DispatchStatus::Pending)
            .cloned()
            .collect::<Vec<_>>();
        pending.sort_by(|a, b| a.submission_id.cmp(&b.submission_id));

        Ok(pending)
    }
}
