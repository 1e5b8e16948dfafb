use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{BookingRecord, ExtractionOutcome};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ExtractRequest {
    pub transcript: String,
    #[serde(default)]
    pub existing_booking: Option<BookingRecord>,
}

pub async fn extract(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExtractRequest>,
) -> Result<Json<ExtractionOutcome>, AppError> {
    let outcome = state
        .extractor
        .extract(&payload.transcript, payload.existing_booking.as_ref())
        .await?;
    Ok(Json(outcome))
}
