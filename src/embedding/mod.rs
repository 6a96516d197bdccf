/// Embedding provider trait and supporting types
///
/// Provides a pluggable interface for text embedding generation.
/// Supports the Gemini embedding API (default) and the OpenAI embeddings API.
/// Both are asked for vectors of the configured dimension (1536 by default),
/// matching the VECTOR(1536) columns of the bookmarks table.

pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::EmbeddingConfig;
use crate::errors::TagscopeError;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Transport failure or unusable response body
    #[error("Embedding generation error: {0}")]
    Generation(String),

    /// API provider returned an HTTP error
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Response decoded but carried no vector
    #[error("Embedding missing in response")]
    MissingVector,

    /// Vector length differs from the configured dimension
    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Provider not configured (e.g., missing API key)
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Core trait for embedding text into fixed-dimension float vectors.
///
/// Implementations must be Send + Sync to support use in async contexts
/// and across thread boundaries (e.g., Arc<dyn EmbeddingProvider>).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Return the model name identifier (e.g., "gemini-embedding-001").
    fn model_name(&self) -> &str;

    /// Return the dimension of the embedding vectors produced by this model.
    fn dimension(&self) -> usize;
}

/// Text embedded for the tag channel: tags joined by single spaces.
pub fn tags_embedding_text(tags: &[String]) -> String {
    tags.join(" ")
}

/// Reject vectors whose length differs from what the schema stores.
pub(crate) fn check_dimension(vector: Vec<f32>, expected: usize) -> Result<Vec<f32>, EmbeddingError> {
    if vector.is_empty() {
        return Err(EmbeddingError::MissingVector);
    }
    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(vector)
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, EmbeddingError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EmbeddingError::NotConfigured(format!("Failed to build HTTP client: {}", e)))
}

/// Create the embedding provider named by configuration.
pub fn create_embedding_provider(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, TagscopeError> {
    let api_key = config.api_key.clone().unwrap_or_default();
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "gemini" => Arc::new(gemini::GeminiEmbeddingProvider::new(api_key, config)?),
        "openai" => Arc::new(openai::OpenAIEmbeddingProvider::new(api_key, config)?),
        other => {
            return Err(TagscopeError::Config(format!(
                "Unknown embedding provider '{}': expected 'gemini' or 'openai'",
                other
            )))
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_embedding_text_joins_with_spaces() {
        let tags = vec!["rust".to_string(), "memory".to_string()];
        assert_eq!(tags_embedding_text(&tags), "rust memory");
        assert_eq!(tags_embedding_text(&[]), "");
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(vec![0.1; 4], 4).is_ok());
        assert!(matches!(
            check_dimension(vec![0.1; 3], 4),
            Err(EmbeddingError::DimensionMismatch { expected: 4, actual: 3 })
        ));
        assert!(matches!(check_dimension(Vec::new(), 4), Err(EmbeddingError::MissingVector)));
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let config = EmbeddingConfig {
            provider: "word2vec".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_embedding_provider(&config),
            Err(TagscopeError::Config(_))
        ));
    }
}
