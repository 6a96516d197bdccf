/// Configuration management using figment
///
/// Loads configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: tagscope.toml (in working directory)
/// 3. Environment variables: prefixed TAGSCOPE_, `__` separates nested keys
///    (e.g., TAGSCOPE_LOG_LEVEL=debug, TAGSCOPE_EMBEDDING__API_KEY=...)
///
/// The loaded value is passed explicitly to every provider constructor; nothing
/// reads configuration from a global.

use figment::{
    Figment,
    providers::{Env, Format, Toml, Serialized},
};
use serde::{Deserialize, Serialize};
use crate::errors::TagscopeError;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional file path for log output (in addition to stderr)
    #[serde(default)]
    pub log_file: Option<String>,

    /// PostgreSQL connection URL (pgvector extension required).
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "gemini" (default) or "openai"
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name; provider default when unset.
    #[serde(default)]
    pub model: Option<String>,
    /// API base URL; provider default when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Vector length. Must match the VECTOR(n) columns in the schema.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

/// Generative model settings, shared by enrichment and reranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// "gemini" (default), "openai" or "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// API base URL; provider default when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model used to summarise and tag new bookmarks.
    #[serde(default)]
    pub enrichment_model: Option<String>,
    /// Model used for precision-mode reranking.
    #[serde(default)]
    pub rerank_model: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

/// Enrichment (page fetch + summarisation) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Maximum model calls per `rate_limit_period_ms` window.
    #[serde(default = "default_rate_limit_calls")]
    pub rate_limit_calls: usize,
    #[serde(default = "default_rate_limit_period_ms")]
    pub rate_limit_period_ms: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Language tags must be written in; the page title's language when unset.
    #[serde(default)]
    pub tag_language: Option<String>,
}

/// Search defaults and bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,
    #[serde(default = "default_max_top_n")]
    pub max_top_n: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost:5432/tagscope".to_string()
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_dimension() -> usize {
    1536
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_calls() -> usize {
    14
}

fn default_rate_limit_period_ms() -> u64 {
    1000
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_top_n() -> usize {
    10
}

fn default_max_top_n() -> usize {
    100
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            provider: default_provider(),
            api_key: None,
            model: None,
            base_url: None,
            dimension: default_dimension(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            provider: default_provider(),
            api_key: None,
            base_url: None,
            enrichment_model: None,
            rerank_model: None,
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        EnrichmentConfig {
            rate_limit_calls: default_rate_limit_calls(),
            rate_limit_period_ms: default_rate_limit_period_ms(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
            tag_language: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            default_top_n: default_top_n(),
            max_top_n: default_max_top_n(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            log_file: None,
            database_url: default_database_url(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            enrichment: EnrichmentConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, TOML file, and environment variables
    ///
    /// Environment variables override TOML file values.
    /// Example: TAGSCOPE_GENERATION__PROVIDER=openai overrides generation.provider in tagscope.toml
    pub fn load() -> Result<Config, TagscopeError> {
        Self::figment()
            .extract()
            .map_err(|e| TagscopeError::Config(format!("Failed to load config: {}", e)))
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("tagscope.toml"))
            .merge(Env::prefixed("TAGSCOPE_").split("__"))
    }
}
