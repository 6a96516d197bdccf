/// Generative model provider trait and supporting types
///
/// A single black-box contract, `generate(prompt) -> text`, shared by bookmark
/// enrichment and precision-mode reranking. Every backend asks its API for JSON
/// output; callers still parse defensively through [`json::parse_model_json`].
///
/// Backends: Gemini (default), any OpenAI-compatible chat completions API, and Ollama.

pub mod gemini;
pub mod json;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::errors::TagscopeError;

/// Errors that can occur while calling a generative model.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport failure or unusable response envelope
    #[error("Generation error: {0}")]
    Generation(String),

    /// API provider returned an HTTP error
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Provider not configured (e.g., missing API key or model)
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl From<GenerationError> for TagscopeError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::NotConfigured(msg) => TagscopeError::Config(msg),
            other => TagscopeError::model(other.to_string()),
        }
    }
}

/// Core trait for text generation with structured (JSON) output.
///
/// Implementations must be Send + Sync to support use in async contexts
/// and across thread boundaries (e.g., Arc<dyn GenerativeModel>).
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Send a single-turn prompt and return the raw model text.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Return the model name identifier used by this provider.
    fn model_name(&self) -> &str;
}

/// Which job a model instance is built for; selects the configured model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Enrichment,
    Rerank,
}

fn default_model(provider: &str, role: ModelRole) -> &'static str {
    match (provider, role) {
        ("gemini", ModelRole::Enrichment) => "gemini-2.5-flash-lite",
        ("gemini", ModelRole::Rerank) => "gemini-2.5-flash",
        ("ollama", _) => "llama3.2:3b",
        _ => "gpt-4o-mini",
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, GenerationError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| GenerationError::NotConfigured(format!("Failed to build HTTP client: {}", e)))
}

/// Create the generative model for `role` based on configuration.
pub fn create_generative_model(
    config: &GenerationConfig,
    role: ModelRole,
) -> Result<Arc<dyn GenerativeModel>, TagscopeError> {
    let model = match role {
        ModelRole::Enrichment => config.enrichment_model.clone(),
        ModelRole::Rerank => config.rerank_model.clone(),
    }
    .unwrap_or_else(|| default_model(&config.provider, role).to_string());
    let api_key = config.api_key.clone().unwrap_or_default();

    let provider: Arc<dyn GenerativeModel> = match config.provider.as_str() {
        "gemini" => Arc::new(gemini::GeminiModel::new(
            config.base_url.clone(),
            api_key,
            model,
            config.timeout_secs,
        )?),
        "openai" => Arc::new(openai::OpenAIChatModel::new(
            config.base_url.clone(),
            api_key,
            model,
            config.timeout_secs,
        )?),
        "ollama" => Arc::new(ollama::OllamaModel::new(
            config.base_url.clone(),
            model,
            config.timeout_secs,
        )?),
        other => {
            return Err(TagscopeError::Config(format!(
                "Unknown generation provider '{}': expected 'gemini', 'openai' or 'ollama'",
                other
            )))
        }
    };
    Ok(provider)
}
