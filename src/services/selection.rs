use std::sync::Arc;

use crate::errors::AppError;
use crate::models::{ProviderCandidate, SelectionOutcome};
use crate::services::ai::{GenerationOptions, Message, StructuredClient};
use crate::services::prompts::PromptSet;

/// Resolves which offered provider the user picked, or whether they confirmed
/// the pick presented to them.
#[derive(Clone)]
pub struct ProviderSelector {
    client: StructuredClient,
    prompts: Arc<PromptSet>,
    options: GenerationOptions,
}

impl ProviderSelector {
    pub fn new(client: StructuredClient, prompts: Arc<PromptSet>, options: GenerationOptions) -> Self {
        Self {
            client,
            prompts,
            options,
        }
    }

    pub async fn select(
        &self,
        transcript: &str,
        candidates: &[ProviderCandidate],
        awaiting_confirmation: bool,
    ) -> Result<SelectionOutcome, AppError> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(AppError::Validation("transcript is required".to_string()));
        }

        let prompts = &self.prompts.selection;
        let messages = if awaiting_confirmation {
            vec![
                Message::system(prompts.confirm_system()?),
                Message::user(prompts.confirm_user(transcript)?),
            ]
        } else {
            vec![
                Message::system(prompts.select_system(&render_candidates(candidates))?),
                Message::user(prompts.select_user(transcript)?),
            ]
        };

        let raw: SelectionOutcome = self
            .client
            .generate(messages, self.options)
            .await
            .map_err(|e| AppError::Ai(format!("{e:#}")))?;

        let outcome = if awaiting_confirmation {
            // Confirmation never re-selects; only the yes/no answer counts.
            SelectionOutcome {
                provider_id: None,
                confirmed: raw.confirmed,
            }
        } else {
            SelectionOutcome {
                provider_id: known_candidate(raw.provider_id, candidates),
                confirmed: false,
            }
        };

        tracing::info!(
            awaiting_confirmation,
            candidates = candidates.len(),
            provider_id = ?outcome.provider_id,
            confirmed = outcome.confirmed,
            "provider selection complete"
        );
        Ok(outcome)
    }
}

/// One line per candidate: `"<n>. <name> (id: <id>)"`, numbered from 1.
pub fn render_candidates(candidates: &[ProviderCandidate]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {} (id: {})", i + 1, p.name, p.id))
        .collect::<Vec<_>>()
        .join("\n")
}

fn known_candidate(id: Option<String>, candidates: &[ProviderCandidate]) -> Option<String> {
    let id = id?;
    let wanted = id.trim();
    match candidates.iter().find(|c| c.id == wanted) {
        Some(candidate) => Some(candidate.id.clone()),
        None => {
            tracing::warn!(provider_id = %id, "model selected an id that was not offered, ignoring");
            None
        }
    }
}
