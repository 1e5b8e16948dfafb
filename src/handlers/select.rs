use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{ProviderCandidate, SelectionOutcome};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SelectRequest {
    pub transcript: String,
    #[serde(default)]
    pub providers: Vec<ProviderCandidate>,
    #[serde(default)]
    pub awaiting_confirmation: bool,
}

pub async fn select(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SelectRequest>,
) -> Result<Json<SelectionOutcome>, AppError> {
    let outcome = state
        .selector
        .select(
            &payload.transcript,
            &payload.providers,
            payload.awaiting_confirmation,
        )
        .await?;
    Ok(Json(outcome))
}
