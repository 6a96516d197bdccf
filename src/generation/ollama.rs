/// Ollama generative model
///
/// Calls the Ollama /api/chat endpoint with `format: "json"` and temperature 0.
/// No API key required; meant for self-hosted Ollama deployments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{http_client, GenerationError, GenerativeModel};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
    format: &'static str,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

/// Ollama-backed generative model.
pub struct OllamaModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaModel {
    /// # Arguments
    /// * `base_url` - Ollama server base URL; http://localhost:11434 when None
    /// * `model` - Model name (e.g., "llama3.2:3b")
    pub fn new(
        base_url: Option<String>,
        model: String,
        timeout_secs: u64,
    ) -> Result<Self, GenerationError> {
        Ok(OllamaModel {
            client: http_client(timeout_secs)?,
            base_url: base_url.unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model,
        })
    }
}

#[async_trait]
impl GenerativeModel for OllamaModel {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages: vec![OllamaMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            options: OllamaOptions { temperature: 0.0 },
            format: "json",
        };

        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Generation(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(GenerationError::Api { status, message: body });
        }

        let chat_response: OllamaChatResponse = response.json().await.map_err(|e| {
            GenerationError::Generation(format!("Failed to parse Ollama response: {}", e))
        })?;

        Ok(chat_response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
