use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, VariantArray};
use ulid::Ulid;

use crate::form::{FormSubmission, FormType};

const QUOTE_PREFIX: &str = "QT-";

/// Time-ordered identifier assigned to an admitted submission.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(String);

impl SubmissionId {
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Accepts a bare ULID or a `QT-` quote id.
    pub fn parse(value: &str) -> Option<Self> {
        let raw = value.strip_prefix(QUOTE_PREFIX).unwrap_or(value);
        Ulid::from_string(raw).ok().map(|id| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn quote_id(&self) -> String {
        format!("{QUOTE_PREFIX}{}", self.0)
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SubmissionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

pub type RecordId = String;

#[derive(
    EnumString,
    Display,
    VariantArray,
    AsRefStr,
    Default,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DispatchStatus {
    #[default]
    Pending,
    Delivered,
    Failed,
}

impl DispatchStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Downstream consumer of an admitted submission.
#[derive(
    EnumString, Display, VariantArray, AsRefStr, Clone, Copy, Debug, PartialEq, Eq, Hash,
)]
#[strum(serialize_all = "snake_case")]
pub enum Target {
    Notification,
    RecordStore,
}

/// Error reported by a downstream collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("transient: {0}")]
    Transient(String),

    #[error("permanent: {0}")]
    Permanent(String),
}

impl DeliveryError {
    pub fn transient(err: impl fmt::Display) -> Self {
        Self::Transient(err.to_string())
    }

    pub fn permanent(err: impl fmt::Display) -> Self {
        Self::Permanent(err.to_string())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetState {
    pub status: DispatchStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Delivery progress of one admitted submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub submission_id: SubmissionId,
    pub form_type: FormType,
    pub status: DispatchStatus,
    /// Attempts spent by the target that took the most, i.e. the one that
    /// settled the record last. Per-target counts live in the target states.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub notification: TargetState,
    pub storage: TargetState,
    pub payload: FormSubmission,
    pub created_at: u64,
    pub updated_at: u64,
}

impl DispatchRecord {
    pub fn pending(submission_id: SubmissionId, payload: FormSubmission, now: u64) -> Self {
        Self {
            submission_id,
            form_type: payload.form_type(),
            status: DispatchStatus::Pending,
            attempts: 0,
            last_error: None,
            notification: TargetState::default(),
            storage: TargetState::default(),
            payload,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn target(&self, target: Target) -> &TargetState {
        match target {
            Target::Notification => &self.notification,
            Target::RecordStore => &self.storage,
        }
    }

    fn target_mut(&mut self, target: Target) -> &mut TargetState {
        match target {
            Target::Notification => &mut self.notification,
            Target::RecordStore => &mut self.storage,
        }
    }

    pub fn record_success(&mut self, target: Target, now: u64) {
        let state = self.target_mut(target);
        state.attempts += 1;
        state.status = DispatchStatus::Delivered;
        self.refresh(now);
    }

    /// `exhausted` marks the target Failed; otherwise it stays Pending for
    /// another attempt.
    pub fn record_failure(
        &mut self,
        target: Target,
        error: &DeliveryError,
        exhausted: bool,
        now: u64,
    ) {
        let state = self.target_mut(target);
        state.attempts += 1;
        state.last_error = Some(error.to_string());
        if exhausted {
            state.status = DispatchStatus::Failed;
        }
        self.last_error = Some(format!("{target}: {error}"));
        self.refresh(now);
    }

    fn refresh(&mut self, now: u64) {
        let states = [self.notification.status, self.storage.status];
        self.status = if states.iter().all(|s| *s == DispatchStatus::Delivered) {
            DispatchStatus::Delivered
        } else if states.iter().all(|s| s.is_terminal()) {
            DispatchStatus::Failed
        } else {
            DispatchStatus::Pending
        };
        self.attempts = self.notification.attempts.max(self.storage.attempts);
        self.updated_at = now;
    }
}
