/// Ingestion orchestrator: enrich, embed and store bookmarks
///
/// Owns the enrichment fallback decision: an unreachable page or unusable model
/// output still produces a (degraded) bookmark, while a failing model or
/// embedding service aborts the URL with DependencyUnavailable.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::embedding::{tags_embedding_text, EmbeddingProvider};
use crate::enrichment::{base_domain, Enriched, Enricher, EnrichmentError};
use crate::errors::TagscopeError;
use crate::store::{Bookmark, BookmarkEdit, BookmarkStore, ListFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    Inserted,
    Duplicate,
}

/// Counts reported by `ingest_many`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

pub struct Ingestor {
    /// None when no generative model is configured; ingest is then unavailable
    enricher: Option<Enricher>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn BookmarkStore>,
}

impl Ingestor {
    pub fn new(
        enricher: Option<Enricher>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn BookmarkStore>,
    ) -> Self {
        Ingestor {
            enricher,
            embedder,
            store,
        }
    }

    /// Enrichment with the fallback policy applied.
    async fn enrich_or_degrade(&self, url: &str) -> Result<Enriched, TagscopeError> {
        let enricher = self.enricher.as_ref().ok_or_else(|| {
            TagscopeError::model("no generative model is configured for enrichment")
        })?;
        match enricher.enrich(url).await {
            Ok(enriched) => Ok(enriched),
            Err(EnrichmentError::Fetch(reason)) => {
                tracing::warn!(url = %url, error = %reason, "Page fetch failed, storing degraded bookmark");
                Ok(Enriched::degraded(base_domain(url), None))
            }
            Err(EnrichmentError::Malformed { message, title, image_url }) => {
                tracing::warn!(url = %url, error = %message, "Unusable enrichment output, storing degraded bookmark");
                Ok(Enriched::degraded(title, image_url))
            }
            Err(e @ EnrichmentError::Model(_)) => Err(e.into()),
        }
    }

    pub async fn ingest(&self, url: &str) -> Result<IngestOutcome, TagscopeError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(TagscopeError::invalid("url", "URL cannot be empty"));
        }

        let enriched = self.enrich_or_degrade(url).await?;

        let embedding_summary = self.embedder.embed(&enriched.summary).await?;
        let embedding_tags = if enriched.tags.is_empty() {
            None
        } else {
            Some(self.embedder.embed(&tags_embedding_text(&enriched.tags)).await?)
        };

        let bookmark = Bookmark {
            link: url.to_string(),
            summary: Some(enriched.summary),
            embedding_summary: Some(embedding_summary),
            embedding_tags,
            base_url: Some(base_domain(url)),
            timestamp: Some(Utc::now()),
            tags: enriched.tags,
            source_type: enriched.source_type,
            image_url: enriched.image_url,
        };

        let outcome = if self.store.insert(&bookmark).await? {
            IngestOutcome::Inserted
        } else {
            IngestOutcome::Duplicate
        };
        tracing::info!(
            url = %url,
            source_type = %bookmark.source_type,
            outcome = ?outcome,
            "Bookmark ingested"
        );
        Ok(outcome)
    }

    /// Ingest URLs one after another, stopping at the first error.
    pub async fn ingest_many(&self, urls: &[String]) -> Result<IngestSummary, TagscopeError> {
        if urls.is_empty() {
            return Err(TagscopeError::invalid("urls", "At least one URL is required"));
        }

        let mut summary = IngestSummary::default();
        for url in urls {
            match self.ingest(url).await? {
                IngestOutcome::Inserted => summary.inserted += 1,
                IngestOutcome::Duplicate => summary.duplicates += 1,
            }
        }
        Ok(summary)
    }

    /// Replace link and summary in place. Embeddings are not recomputed.
    pub async fn update(
        &self,
        original_link: &str,
        new_link: &str,
        new_summary: &str,
    ) -> Result<(), TagscopeError> {
        let original_link = original_link.trim();
        let new_link = new_link.trim();
        if original_link.is_empty() {
            return Err(TagscopeError::invalid("original_link", "original_link cannot be empty"));
        }
        if new_link.is_empty() {
            return Err(TagscopeError::invalid("new_link", "new_link cannot be empty"));
        }

        let edit = BookmarkEdit {
            new_link: new_link.to_string(),
            new_summary: new_summary.to_string(),
        };
        self.store.update(original_link, &edit).await?;
        tracing::info!(original_link = %original_link, new_link = %new_link, "Bookmark updated");
        Ok(())
    }

    /// Delete by exact link. Returns how many rows were removed.
    pub async fn remove(&self, links: &[String]) -> Result<u64, TagscopeError> {
        if links.is_empty() {
            return Err(TagscopeError::invalid("urls", "At least one URL is required"));
        }

        let mut removed = 0;
        for link in links {
            removed += self.store.delete(link.trim()).await?;
        }
        tracing::info!(requested = links.len(), removed, "Bookmarks removed");
        Ok(removed)
    }

    pub async fn list(&self, filter: &ListFilter) -> Result<Vec<Bookmark>, TagscopeError> {
        self.store.list(filter).await
    }
}
