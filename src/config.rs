use std::env;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::services::ai::GenerationOptions;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub llm_base_url: String,
    pub llm_api_key: SecretString,
    pub llm_model: String,
    pub llm_temperature: f64,
    pub llm_max_retries: u32,
    pub llm_timeout_secs: u64,
    pub prompts_file: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parsed("PORT", 8000),
            llm_base_url: env::var("VLLM_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/v1".to_string()),
            llm_api_key: SecretString::new(
                env::var("VLLM_API_KEY").unwrap_or_else(|_| "not-required".to_string()),
            ),
            llm_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "Qwen/Qwen2.5-7B-Instruct-GPTQ-Int4".to_string()),
            llm_temperature: parsed("LLM_TEMPERATURE", 0.1),
            llm_max_retries: parsed("LLM_MAX_RETRIES", 2),
            llm_timeout_secs: parsed("LLM_TIMEOUT_SECS", 60),
            prompts_file: env::var("PROMPTS_FILE").unwrap_or_else(|_| "prompts.yaml".to_string()),
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: self.llm_temperature,
            max_retries: self.llm_max_retries,
        }
    }
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparseable setting, using default");
            default
        }),
        Err(_) => default,
    }
}
