use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use super::{ChatRequest, LlmProvider};

/// Any server speaking the OpenAI chat-completions protocol (vLLM, Groq, OpenAI).
pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: SecretString,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        base_url: String,
        api_key: SecretString,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
        });
        if request.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<String> {
        let resp = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(request))
            .send()
            .await
            .context("failed to call LLM backend")?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .context("failed to read LLM backend response")?;

        completion_content(status, &body)
    }
}

/// Pull the assistant text out of a chat-completions response. The status is
/// checked before decoding so a non-JSON error page still reports it.
fn completion_content(status: reqwest::StatusCode, body: &str) -> anyhow::Result<String> {
    if !status.is_success() {
        anyhow::bail!("LLM backend error ({}): {}", status, body.trim());
    }

    let data: serde_json::Value =
        serde_json::from_str(body).context("failed to parse LLM backend response")?;

    data["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("missing content in LLM backend response"))
}
