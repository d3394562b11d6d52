use async_trait::async_trait;
use formgate_shared::dispatch::{DeliveryError, RecordId, SubmissionId};
use formgate_shared::form::FormSubmission;

/// Message handed to the notification sender for one admitted submission.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub submission_id: SubmissionId,
    pub submission: FormSubmission,
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, message: &Notification) -> Result<(), DeliveryError>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Must tolerate being called again for the same submission id.
    async fn persist(
        &self,
        submission_id: &SubmissionId,
        submission: &FormSubmission,
    ) -> Result<RecordId, DeliveryError>;
}
