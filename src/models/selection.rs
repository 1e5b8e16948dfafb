use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::schema::StructuredOutput;

/// A provider the caller has offered to the user. Extra keys sent by the caller
/// (rating, distance, ...) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderCandidate {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SelectionOutcome {
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub confirmed: bool,
}

impl StructuredOutput for SelectionOutcome {
    const NAME: &'static str = "ProviderSelectionResult";

    fn json_schema() -> Value {
        json!({
            "title": Self::NAME,
            "type": "object",
            "properties": {
                "provider_id": {
                    "anyOf": [{ "type": "string" }, { "type": "null" }],
                    "default": null,
                    "description": "ID of the selected provider, or null if not clearly selected."
                },
                "confirmed": {
                    "type": "boolean",
                    "default": false,
                    "description": "True if the user confirmed an existing selection (e.g., 'yes', 'confirm', 'that one')."
                }
            }
        })
    }

    fn validate(&mut self) -> Result<(), String> {
        if self.provider_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            self.provider_id = None;
        }
        Ok(())
    }
}
