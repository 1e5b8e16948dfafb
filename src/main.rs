use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use booking_extract::config::AppConfig;
use booking_extract::services::ai::openai::OpenAiCompatProvider;
use booking_extract::services::ai::{LlmProvider, StructuredClient};
use booking_extract::services::extraction::BookingExtractor;
use booking_extract::services::prompts::PromptSet;
use booking_extract::services::selection::ProviderSelector;
use booking_extract::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let prompts = Arc::new(
        PromptSet::load(&config.prompts_file)
            .with_context(|| format!("failed to load prompt templates from {}", config.prompts_file))?,
    );

    let provider = OpenAiCompatProvider::new(
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
        config.llm_timeout(),
    )?;
    tracing::info!(
        "using LLM backend {} (model: {}, temperature: {}, max retries: {})",
        config.llm_base_url,
        provider.model(),
        config.llm_temperature,
        config.llm_max_retries,
    );
    let llm: Arc<dyn LlmProvider> = Arc::new(provider);
    let client = StructuredClient::new(llm);

    let state = Arc::new(AppState {
        extractor: BookingExtractor::new(
            client.clone(),
            prompts.clone(),
            config.generation_options(),
        ),
        selector: ProviderSelector::new(client, prompts, config.generation_options()),
    });

    let app = booking_extract::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
