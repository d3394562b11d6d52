use axum::{Json, extract::State, extract::rejection::JsonRejection};
use formgate_intake::{RawPayload, Submitted};
use formgate_shared::form::FormType;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::routes::{AppState, IdempotencyKeyHeader};

pub const ACCEPTED_MESSAGE: &str = "Thank you for your message. We will get back to you soon.";

/// POST /contact
pub async fn submit(
    State(state): State<AppState>,
    key: IdempotencyKeyHeader,
    payload: Result<Json<RawPayload>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(raw) = payload?;

    let submitted = state
        .intake
        .submit(&raw, FormType::Contact, key.as_deref())
        .await?;

    let body = match submitted {
        Submitted::Accepted(_) => json!({ "message": ACCEPTED_MESSAGE }),
        Submitted::Duplicate(duplicate) => json!({
            "message": ACCEPTED_MESSAGE,
            "duplicate": true,
            "status": duplicate.status,
        }),
    };

    Ok(Json(body))
}
