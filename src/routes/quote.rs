use axum::{Json, extract::State, extract::rejection::JsonRejection};
use formgate_intake::{RawPayload, Submitted};
use formgate_shared::form::FormType;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::routes::{AppState, IdempotencyKeyHeader};

pub const ACCEPTED_MESSAGE: &str = "Quote request received. Our team will contact you shortly.";

/// POST /quote
///
/// The quote id is derived from the submission id, so a duplicate reports
/// the id of the request it collapsed into.
pub async fn submit(
    State(state): State<AppState>,
    key: IdempotencyKeyHeader,
    payload: Result<Json<RawPayload>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(raw) = payload?;

    let submitted = state
        .intake
        .submit(&raw, FormType::Quote, key.as_deref())
        .await?;

    let quote_id = submitted.submission_id().quote_id();
    let body = match submitted {
        Submitted::Accepted(_) => json!({
            "message": ACCEPTED_MESSAGE,
            "quoteId": quote_id,
        }),
        Submitted::Duplicate(duplicate) => json!({
            "message": ACCEPTED_MESSAGE,
            "quoteId": quote_id,
            "duplicate": true,
            "status": duplicate.status,
        }),
    };

    Ok(Json(body))
}
