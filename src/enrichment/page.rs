/// Page fetching and HTML metadata extraction
///
/// One GET per bookmark; the title and the og:image preview both come from
/// the same document.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;

use super::EnrichmentError;
use crate::config::EnrichmentConfig;

/// Fetches the raw HTML of a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, EnrichmentError>;
}

/// reqwest-backed fetcher with a browser-like User-Agent and a request timeout.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(config: &EnrichmentConfig) -> Result<Self, EnrichmentError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| EnrichmentError::Fetch(format!("Failed to build HTTP client: {}", e)))?;
        Ok(HttpPageFetcher { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, EnrichmentError> {
        tracing::debug!(url = %url, "Fetching page");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EnrichmentError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EnrichmentError::Fetch(format!(
                "{} returned HTTP {}",
                url,
                response.status().as_u16()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| EnrichmentError::Fetch(format!("Failed to read body: {}", e)))
    }
}

/// Metadata pulled out of a fetched page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetadata {
    /// Trimmed `<title>` text; None when absent or blank
    pub title: Option<String>,
    /// Trimmed `meta[property="og:image"]` content
    pub image_url: Option<String>,
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn extract_metadata(html: &str) -> PageMetadata {
    let document = Html::parse_document(html);
    PageMetadata {
        title: extract_title(&document),
        image_url: extract_og_image(&document),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let element = document.select(&selector).next()?;
    non_blank(&element.text().collect::<String>())
}

fn extract_og_image(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"meta[property="og:image"]"#).ok()?;
    document
        .select(&selector)
        .filter_map(|meta| meta.value().attr("content"))
        .find_map(non_blank)
}
