/// Gemini embedding provider
///
/// Calls `models/{model}:embedContent` on the Generative Language API with
/// `output_dimensionality` set to the configured dimension.
/// The key travels as the `key` query parameter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{check_dimension, http_client, EmbeddingError, EmbeddingProvider};
use crate::config::{EmbeddingConfig, GEMINI_BASE_URL};

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    output_dimensionality: usize,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// `embedContent` answers with `embedding.values`; some proxies wrap it as
/// `data[0].embedding.values`. Both shapes are accepted.
#[derive(Deserialize, Default)]
struct EmbedContentResponse {
    embedding: Option<Values>,
    #[serde(default)]
    data: Vec<DataEntry>,
}

#[derive(Deserialize)]
struct DataEntry {
    embedding: Option<Values>,
}

#[derive(Deserialize)]
struct Values {
    #[serde(default)]
    values: Vec<f32>,
}

impl EmbedContentResponse {
    fn into_vector(self) -> Option<Vec<f32>> {
        self.embedding
            .map(|e| e.values)
            .filter(|v| !v.is_empty())
            .or_else(|| {
                self.data
                    .into_iter()
                    .next()
                    .and_then(|d| d.embedding)
                    .map(|e| e.values)
                    .filter(|v| !v.is_empty())
            })
    }
}

/// Gemini-backed embedding provider (gemini-embedding-001 by default).
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dim: usize,
}

impl GeminiEmbeddingProvider {
    /// # Errors
    /// Returns `EmbeddingError::NotConfigured` if api_key is empty.
    pub fn new(api_key: String, config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        if api_key.trim().is_empty() {
            return Err(EmbeddingError::NotConfigured(
                "Google API key is required when using the gemini embedding provider. \
                 Set TAGSCOPE_EMBEDDING__API_KEY or embedding.api_key in tagscope.toml"
                    .to_string(),
            ));
        }

        Ok(GeminiEmbeddingProvider {
            client: http_client(config.timeout_secs)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gemini-embedding-001".to_string()),
            dim: config.dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: [Part { text }],
            },
            output_dimensionality: self.dim,
        };

        let url = format!("{}/models/{}:embedContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::Generation(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EmbeddingError::Api {
                status,
                message: body,
            });
        }

        let body: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Generation(format!("Failed to parse API response: {}", e)))?;

        let vector = body.into_vector().ok_or(EmbeddingError::MissingVector)?;
        check_dimension(vector, self.dim)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
