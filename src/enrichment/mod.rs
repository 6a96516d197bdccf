/// Bookmark enrichment: page title, summary, tags and site category
///
/// Fetches the page once, asks the generative model for a JSON
/// `{summary, tags, source_type}` built from the title, and normalises the reply.
/// Failures are reported as distinct `EnrichmentError` variants; deciding
/// whether to fall back to a degraded record is left to the ingestor.

pub mod limiter;
pub mod page;

use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;

use crate::config::EnrichmentConfig;
use crate::errors::TagscopeError;
use crate::generation::json::parse_model_json;
use crate::generation::{GenerationError, GenerativeModel};
use crate::store::SourceType;

pub use limiter::RateLimiter;
pub use page::{HttpPageFetcher, PageFetcher};

/// Maximum number of tags kept per bookmark.
pub const MAX_TAGS: usize = 8;

#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// Page could not be fetched
    #[error("Page fetch failed: {0}")]
    Fetch(String),

    /// Model replied, but not with usable JSON
    #[error("Malformed model output: {message}")]
    Malformed {
        message: String,
        title: String,
        image_url: Option<String>,
    },

    /// Model transport or API failure
    #[error("Model call failed: {0}")]
    Model(#[from] GenerationError),
}

impl From<EnrichmentError> for TagscopeError {
    fn from(e: EnrichmentError) -> Self {
        match e {
            EnrichmentError::Model(inner) => inner.into(),
            EnrichmentError::Fetch(msg) => TagscopeError::DependencyUnavailable {
                dependency: "page fetch",
                message: msg,
            },
            malformed @ EnrichmentError::Malformed { .. } => TagscopeError::model(malformed.to_string()),
        }
    }
}

/// Output of a successful (or degraded) enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct Enriched {
    pub title: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub source_type: SourceType,
    pub image_url: Option<String>,
}

impl Enriched {
    /// Stand-in record when the page or the model output is unusable:
    /// the title doubles as summary and sole tag.
    pub fn degraded(title: String, image_url: Option<String>) -> Self {
        Enriched {
            summary: title.clone(),
            tags: vec![title.clone()],
            title,
            source_type: SourceType::Etc,
            image_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EnrichmentReply {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    source_type: Option<String>,
}

/// Host part of `url` (`https?://([^/]+)`), or the whole url when it has no scheme.
pub fn base_domain(url: &str) -> String {
    static HOST: OnceLock<Option<Regex>> = OnceLock::new();
    HOST.get_or_init(|| Regex::new(r"https?://([^/]+)").ok())
        .as_ref()
        .and_then(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| url.to_string())
}

/// Trim, drop empties, de-duplicate keeping first occurrence, cap at MAX_TAGS.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(MAX_TAGS);
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || out.iter().any(|t| t == tag) {
            continue;
        }
        out.push(tag.to_string());
        if out.len() == MAX_TAGS {
            break;
        }
    }
    out
}

pub fn build_enrichment_prompt(
    title: &str,
    url: &str,
    base_domain: &str,
    tag_language: Option<&str>,
) -> String {
    let tag_rule = match tag_language {
        Some(lang) => format!("Every tag must be a word in {}.", lang),
        None => "Write the tags in the same language as the Title.".to_string(),
    };
    format!(
        "Input:\n\
         - Title: {title}\n\
         - Url: {url}\n\
         - BaseDomain: {base_domain}\n\n\
         Tasks:\n\
         1) Summarise concisely using only the Title text. Never translate; keep the Title's language.\n\
         2) Using the Title, produce the top {max} broad but relevant tags. {tag_rule}\n\
         3) Classify the site as one of: Social, Media, Portal, Blog, Tool, News, Public, Etc\n\
         4) Output JSON only.\n\
         JSON:\n\
         {{\n  \"summary\": \"string\",\n  \"tags\": [\"string\", ...],\n  \
         \"source_type\": \"Social|Media|Portal|Blog|Tool|News|Public|Etc\"\n}}",
        title = title,
        url = url,
        base_domain = base_domain,
        max = MAX_TAGS,
        tag_rule = tag_rule,
    )
}

/// Turns a URL into an `Enriched` record using a page fetcher and a generative model.
pub struct Enricher {
    model: Arc<dyn GenerativeModel>,
    fetcher: Arc<dyn PageFetcher>,
    limiter: RateLimiter,
    tag_language: Option<String>,
}

impl Enricher {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        fetcher: Arc<dyn PageFetcher>,
        config: &EnrichmentConfig,
    ) -> Self {
        Enricher {
            model,
            fetcher,
            limiter: RateLimiter::new(
                config.rate_limit_calls,
                Duration::from_millis(config.rate_limit_period_ms),
            ),
            tag_language: config.tag_language.clone(),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub async fn enrich(&self, url: &str) -> Result<Enriched, EnrichmentError> {
        let domain = base_domain(url);
        let html = self.fetcher.fetch(url).await?;
        let metadata = page::extract_metadata(&html);
        let title = metadata.title.unwrap_or_else(|| domain.clone());

        let prompt = build_enrichment_prompt(&title, url, &domain, self.tag_language.as_deref());

        self.limiter.acquire().await;
        let raw = self.model.generate(&prompt).await?;

        let reply: EnrichmentReply = match parse_model_json(&raw) {
            Some(reply) => reply,
            None => {
                return Err(EnrichmentError::Malformed {
                    message: format!("no JSON object in {} chars of output", raw.len()),
                    title,
                    image_url: metadata.image_url,
                })
            }
        };

        let summary = reply
            .summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| title.clone());
        let tags = normalize_tags(reply.tags.unwrap_or_default());
        let source_type = reply
            .source_type
            .as_deref()
            .map(SourceType::parse_lenient)
            .unwrap_or_default();

        tracing::debug!(
            url = %url,
            tags = tags.len(),
            source_type = %source_type,
            "Enriched bookmark"
        );

        Ok(Enriched {
            title,
            summary,
            tags,
            source_type,
            image_url: metadata.image_url,
        })
    }
}
