use std::sync::Arc;

use crate::models::StructuredOutput;

use super::{ChatRequest, LlmProvider, Message};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f64,
    /// Total attempts at producing valid output; values below 1 still make one call.
    pub max_retries: u32,
}

/// Asks the backend for a value of a declared schema and re-asks when the reply
/// does not parse or validate.
#[derive(Clone)]
pub struct StructuredClient {
    llm: Arc<dyn LlmProvider>,
}

impl StructuredClient {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub async fn generate<T: StructuredOutput>(
        &self,
        messages: Vec<Message>,
        options: GenerationOptions,
    ) -> anyhow::Result<T> {
        let mut conversation = with_schema_instructions::<T>(messages);
        let attempts = options.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let request = ChatRequest {
                messages: conversation.clone(),
                temperature: options.temperature,
                json_mode: true,
            };
            let raw = self.llm.chat(&request).await?;

            match parse_structured::<T>(&raw) {
                Ok(value) => {
                    tracing::debug!(schema = T::NAME, attempt, "structured output accepted");
                    return Ok(value);
                }
                Err(reason) => {
                    tracing::warn!(
                        schema = T::NAME,
                        attempt,
                        attempts,
                        error = %reason,
                        "LLM output rejected"
                    );
                    conversation.push(Message::assistant(raw));
                    conversation.push(Message::user(format!(
                        "Your previous reply was not valid: {reason}\n\
                         Reply again with only a JSON object that matches the schema."
                    )));
                    last_error = reason;
                }
            }
        }

        anyhow::bail!(
            "{} output still invalid after {attempts} attempt(s): {last_error}",
            T::NAME
        )
    }
}

/// JSON mode constrains the syntax but not the shape, so the schema travels in
/// the system message.
fn with_schema_instructions<T: StructuredOutput>(mut messages: Vec<Message>) -> Vec<Message> {
    let schema = serde_json::to_string_pretty(&T::json_schema()).unwrap_or_default();
    let instructions = format!(
        "Respond only with a JSON object that matches this JSON schema \
         (use null for anything you cannot determine):\n{schema}"
    );

    match messages.iter_mut().find(|m| m.role == "system") {
        Some(system) => {
            system.content.push_str("\n\n");
            system.content.push_str(&instructions);
        }
        None => messages.insert(0, Message::system(instructions)),
    }
    messages
}

fn parse_structured<T: StructuredOutput>(response: &str) -> Result<T, String> {
    let mut last_error = "reply did not contain a JSON object".to_string();

    for candidate in json_candidates(response) {
        match serde_json::from_str::<T>(candidate) {
            Ok(mut value) => {
                value.validate()?;
                return Ok(value);
            }
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(last_error)
}

/// The raw reply, the reply without markdown fences, and the outermost `{...}`.
fn json_candidates(response: &str) -> Vec<&str> {
    let trimmed = response.trim();
    let mut candidates = vec![trimmed];

    let cleaned = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();
    if cleaned != trimmed {
        candidates.push(cleaned);
    }

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            let object = &cleaned[start..=end];
            if object != cleaned {
                candidates.push(object);
            }
        }
    }

    candidates
}
