use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::errors::AppError;
use crate::models::{BookingField, BookingRecord, ExtractionOutcome};
use crate::services::ai::{GenerationOptions, Message, StructuredClient};
use crate::services::prompts::{ExtractionPrompts, PromptSet};

/// Turns a transcript plus the booking collected so far into an updated booking,
/// the required fields still missing, and a follow-up question.
#[derive(Clone)]
pub struct BookingExtractor {
    client: StructuredClient,
    prompts: Arc<PromptSet>,
    options: GenerationOptions,
}

impl BookingExtractor {
    pub fn new(client: StructuredClient, prompts: Arc<PromptSet>, options: GenerationOptions) -> Self {
        Self {
            client,
            prompts,
            options,
        }
    }

    pub async fn extract(
        &self,
        transcript: &str,
        prior: Option<&BookingRecord>,
    ) -> Result<ExtractionOutcome, AppError> {
        self.extract_on(Local::now().date_naive(), transcript, prior)
            .await
    }

    /// Same as [`extract`](Self::extract) with an explicit "today" for resolving
    /// relative dates.
    pub async fn extract_on(
        &self,
        today: NaiveDate,
        transcript: &str,
        prior: Option<&BookingRecord>,
    ) -> Result<ExtractionOutcome, AppError> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(AppError::Validation("transcript is required".to_string()));
        }

        let prompts = &self.prompts.extraction;
        let existing_context = prior
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}{}", prompts.existing_context_prefix, p.summary()))
            .unwrap_or_default();

        let messages = vec![
            Message::system(prompts.system(&today.format("%Y-%m-%d, %A").to_string())?),
            Message::user(prompts.user(transcript, &existing_context)?),
        ];
        tracing::debug!(transcript, has_prior = prior.is_some(), "extracting booking");

        let extracted: BookingRecord = self
            .client
            .generate(messages, self.options)
            .await
            .map_err(|e| AppError::Ai(format!("{e:#}")))?;

        let outcome = resolve(prompts, prior, &extracted);
        tracing::info!(
            missing = ?outcome.missing_fields,
            "booking extraction complete"
        );
        Ok(outcome)
    }
}

/// Merge, find missing fields, and phrase the follow-up.
pub fn resolve(
    prompts: &ExtractionPrompts,
    prior: Option<&BookingRecord>,
    extracted: &BookingRecord,
) -> ExtractionOutcome {
    let booking = BookingRecord::merge(prior, extracted);
    let missing_fields = missing_fields(&prompts.required_fields, &booking);
    let clarification_prompt = clarification(prompts, &missing_fields);

    ExtractionOutcome {
        booking,
        missing_fields,
        clarification_prompt,
    }
}

pub fn missing_fields(required: &[BookingField], booking: &BookingRecord) -> Vec<BookingField> {
    required
        .iter()
        .copied()
        .filter(|f| !booking.is_set(*f))
        .collect()
}

/// Questions for the first `max_clarification_fields` missing fields, joined.
/// `None` only when nothing is missing.
pub fn clarification(prompts: &ExtractionPrompts, missing: &[BookingField]) -> Option<String> {
    if missing.is_empty() {
        return None;
    }

    let questions: Vec<&str> = missing
        .iter()
        .take(prompts.max_clarification_fields)
        .filter_map(|f| prompts.question(*f))
        .collect();
    Some(questions.join(&prompts.clarification_joiner))
}
