/// OpenAI-compatible generative model
///
/// Calls any OpenAI-compatible Chat Completions API with json_object response format.
/// The base_url is configurable, so OpenAI and compatible gateways both work.
/// Requires an API key. A completion without content yields an empty string.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{http_client, GenerationError, GenerativeModel};
use crate::config::OPENAI_BASE_URL;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
    }
}

/// OpenAI-compatible chat model.
pub struct OpenAIChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAIChatModel {
    /// Create a new OpenAIChatModel.
    ///
    /// # Arguments
    /// * `base_url` - API base URL; https://api.openai.com/v1 when None
    /// * `api_key` - API key (must be non-empty)
    /// * `model` - Model name (e.g., "gpt-4o-mini")
    ///
    /// # Errors
    /// Returns `GenerationError::NotConfigured` if api_key is empty.
    pub fn new(
        base_url: Option<String>,
        api_key: String,
        model: String,
        timeout_secs: u64,
    ) -> Result<Self, GenerationError> {
        if api_key.trim().is_empty() {
            return Err(GenerationError::NotConfigured(
                "API key is required when using the openai generation provider. \
                 Set TAGSCOPE_GENERATION__API_KEY or generation.api_key in tagscope.toml"
                    .to_string(),
            ));
        }

        Ok(OpenAIChatModel {
            client: http_client(timeout_secs)?,
            base_url: base_url.unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl GenerativeModel for OpenAIChatModel {
    /// POST to {base_url}/chat/completions with json_object response format.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            GenerationError::Generation(format!("Failed to parse chat completion: {}", e))
        })?;

        let text = chat_response.into_text();
        if text.is_empty() {
            tracing::warn!(model = %self.model, "Chat completion returned no content");
        }
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
