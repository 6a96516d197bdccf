/// Gemini generative model
///
/// Calls `models/{model}:generateContent` with
/// `generationConfig.responseMimeType = "application/json"`.
/// The text of the first candidate's parts is concatenated and returned as-is.
/// A reply without text (blocked or empty candidate) comes back as an empty
/// string so callers treat it like any other unparseable output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{http_client, GenerationError, GenerativeModel};
use crate::config::GEMINI_BASE_URL;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationSettings,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default()
    }
}

/// Gemini-backed generative model.
pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiModel {
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
                "Google API key not configured. \
                 Set TAGSCOPE_GENERATION__API_KEY or generation.api_key in tagscope.toml"
                    .to_string(),
            ));
        }

        Ok(GeminiModel {
            client: http_client(timeout_secs)?,
            base_url: base_url.unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerateContentRequest {
            contents: [RequestContent {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: GenerationSettings {
                response_mime_type: "application/json",
            },
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
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

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            GenerationError::Generation(format!("Failed to parse Gemini response: {}", e))
        })?;

        let text = body.into_text();
        if text.is_empty() {
            tracing::warn!(model = %self.model, "Gemini returned no text");
        }
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
