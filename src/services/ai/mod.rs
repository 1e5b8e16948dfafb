pub mod openai;
pub mod structured;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use structured::{GenerationOptions, StructuredClient};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub temperature: f64,
    /// Ask the backend to constrain decoding to a single JSON object.
    pub json_mode: bool,
}

/// One round trip to a chat-completion backend. Returns the raw assistant text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<String>;
}
