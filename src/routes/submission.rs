use axum::{
    Json,
    extract::{Path, State},
};
use formgate_shared::dispatch::{DispatchRecord, DispatchStatus, SubmissionId, TargetState};
use formgate_shared::form::FormType;
use serde::Serialize;

use crate::error::AppError;
use crate::routes::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetView {
    pub status: DispatchStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl From<TargetState> for TargetView {
    fn from(state: TargetState) -> Self {
        Self {
            status: state.status,
            attempts: state.attempts,
            last_error: state.last_error,
        }
    }
}

/// Delivery progress without the submitted payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    pub submission_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<String>,
    pub form_type: FormType,
    pub status: DispatchStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub notification: TargetView,
    pub storage: TargetView,
    pub created_at: u64,
    pub updated_at: u64,
}

impl From<DispatchRecord> for SubmissionView {
    fn from(record: DispatchRecord) -> Self {
        let quote_id = match record.form_type {
            FormType::Quote => Some(record.submission_id.quote_id()),
            FormType::Contact => None,
        };

        Self {
            submission_id: record.submission_id.to_string(),
            quote_id,
            form_type: record.form_type,
            status: record.status,
            attempts: record.attempts,
            last_error: record.last_error,
            notification: record.notification.into(),
            storage: record.storage.into(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// GET /submissions/{id}
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SubmissionView>, AppError> {
    let not_found = || AppError::NotFound(format!("Submission {id} not found"));

    let submission_id = SubmissionId::parse(&id).ok_or_else(not_found)?;
    let record = state
        .intake
        .queue()
        .log()
        .get(&submission_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(record.into()))
}
