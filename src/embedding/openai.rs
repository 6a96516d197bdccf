/// OpenAI embedding provider
///
/// Calls the OpenAI Embeddings API using reqwest.
/// Uses text-embedding-3-small, asking for `dimensions` = the configured dimension
/// (1536 by default) so vectors fit the bookmarks table.
/// Requires TAGSCOPE_EMBEDDING__API_KEY or embedding.api_key in tagscope.toml.

use async_trait::async_trait;

use super::{check_dimension, http_client, EmbeddingError, EmbeddingProvider};
use crate::config::{EmbeddingConfig, OPENAI_BASE_URL};

/// Request body for OpenAI Embeddings API
#[derive(serde::Serialize)]
struct EmbedRequest {
    input: String,
    model: String,
    dimensions: usize,
}

/// Response from OpenAI Embeddings API
#[derive(serde::Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    data: Vec<EmbedData>,
}

/// Single embedding result from OpenAI
#[derive(serde::Deserialize)]
struct EmbedData {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// OpenAI-backed embedding provider.
///
/// Requires a valid API key; checked on construction, not at embed time.
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dim: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a new OpenAIEmbeddingProvider.
    ///
    /// # Errors
    /// Returns `EmbeddingError::NotConfigured` if api_key is empty.
    pub fn new(api_key: String, config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        if api_key.trim().is_empty() {
            return Err(EmbeddingError::NotConfigured(
                "OpenAI API key is required when using the openai embedding provider. \
                 Set TAGSCOPE_EMBEDDING__API_KEY or embedding.api_key in tagscope.toml"
                    .to_string(),
            ));
        }

        Ok(OpenAIEmbeddingProvider {
            client: http_client(config.timeout_secs)?,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            dim: config.dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbedRequest {
            input: text.to_string(),
            model: self.model.clone(),
            dimensions: self.dim,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Generation(format!("Failed to parse API response: {}", e)))?;

        let vector = embed_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(EmbeddingError::MissingVector)?;

        check_dimension(vector, self.dim)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_api_key_rejected() {
        let result = OpenAIEmbeddingProvider::new("  ".to_string(), &EmbeddingConfig::default());
        assert!(matches!(result, Err(EmbeddingError::NotConfigured(_))));
    }

    #[test]
    fn test_defaults_applied() {
        let provider =
            OpenAIEmbeddingProvider::new("sk-test".to_string(), &EmbeddingConfig::default())
                .expect("provider should build");
        assert_eq!(provider.model_name(), "text-embedding-3-small");
        assert_eq!(provider.dimension(), 1536);
        assert_eq!(provider.base_url, OPENAI_BASE_URL);
    }
}
