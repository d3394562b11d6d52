use axum::{Json, extract::State};
use formgate_intake::MetricsSnapshot;

use crate::routes::AppState;

/// GET /metrics
pub async fn show(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.intake.queue().metrics().snapshot())
}
