pub mod rerank;

pub use rerank::{RerankOutcome, Reranker};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::config::SearchConfig;
use crate::embedding::EmbeddingProvider;
use crate::errors::TagscopeError;
use crate::store::{BookmarkStore, HybridQuery, ScoredBookmark, SourceType};

/// A search hit as returned to callers.
///
/// `total_score` is the plain sum of the three component scores.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub link: String,
    pub summary: Option<String>,
    pub base_url: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub source_type: SourceType,
    pub image_url: Option<String>,
    pub bm25_score: f64,
    pub sim_score: f64,
    pub tag_score: f64,
    pub total_score: f64,
}

impl From<ScoredBookmark> for SearchResult {
    fn from(scored: ScoredBookmark) -> Self {
        let b = scored.bookmark;
        SearchResult {
            link: b.link,
            summary: b.summary,
            base_url: b.base_url,
            timestamp: b.timestamp,
            tags: b.tags,
            source_type: b.source_type,
            image_url: b.image_url,
            bm25_score: scored.bm25_score,
            sim_score: scored.sim_score,
            tag_score: scored.tag_score,
            total_score: scored.bm25_score + scored.sim_score + scored.tag_score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub count: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    /// Page size; the configured default when None
    pub top_n: Option<usize>,
    /// Rerank the page with the generative model
    pub precision: bool,
    pub type_filter: Option<Vec<SourceType>>,
    pub tag_filter: Option<Vec<String>>,
}

fn split_csv(input: Option<&str>) -> Vec<&str> {
    input
        .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// Parse a comma-separated list of source types ("Blog, news").
///
/// Blank input means no filter. Unknown names are rejected.
pub fn parse_type_filter(input: Option<&str>) -> Result<Option<Vec<SourceType>>, TagscopeError> {
    let mut types = Vec::new();
    for name in split_csv(input) {
        let source_type: SourceType = name
            .parse()
            .map_err(|e: String| TagscopeError::invalid("types", &e))?;
        if !types.contains(&source_type) {
            types.push(source_type);
        }
    }
    Ok(if types.is_empty() { None } else { Some(types) })
}

/// Parse a comma-separated tag list. Blank input means no filter.
pub fn parse_tag_filter(input: Option<&str>) -> Option<Vec<String>> {
    let tags: Vec<String> = split_csv(input).into_iter().map(String::from).collect();
    if tags.is_empty() {
        None
    } else {
        Some(tags)
    }
}

/// Hybrid lexical + vector search with optional model reranking.
pub struct HybridSearch {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn BookmarkStore>,
    reranker: Option<Reranker>,
    config: SearchConfig,
}

impl HybridSearch {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn BookmarkStore>,
        reranker: Option<Reranker>,
        config: SearchConfig,
    ) -> Self {
        HybridSearch {
            embedder,
            store,
            reranker,
            config,
        }
    }

    fn resolve_top_n(&self, top_n: Option<usize>) -> Result<usize, TagscopeError> {
        let top_n = top_n.unwrap_or(self.config.default_top_n);
        if top_n == 0 {
            return Err(TagscopeError::invalid("top_n", "top_n must be at least 1"));
        }
        Ok(top_n.min(self.config.max_top_n.max(1)))
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, TagscopeError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(TagscopeError::invalid("query", "Query cannot be empty"));
        }
        let top_n = self.resolve_top_n(request.top_n)?;

        let reranker = match (request.precision, self.reranker.as_ref()) {
            (true, None) => {
                return Err(TagscopeError::model(
                    "precision search requested but no generative model is configured",
                ))
            }
            (true, Some(r)) => Some(r),
            (false, _) => None,
        };

        // Same vector serves both the summary and the tag channel
        let query_vector = self.embedder.embed(query).await?;

        let hybrid = HybridQuery {
            lexical_query: query.to_string(),
            summary_vector: query_vector.clone(),
            tag_vector: query_vector,
            type_filter: request.type_filter.clone(),
            tag_filter: request.tag_filter.clone(),
            limit: top_n as i64,
        };
        let rows = self.store.query_hybrid(&hybrid).await?;

        let mut results: Vec<SearchResult> = rows.into_iter().map(SearchResult::from).collect();
        for (rank, r) in results.iter().enumerate() {
            tracing::debug!(
                rank = rank + 1,
                link = %r.link,
                bm25 = r.bm25_score,
                sim = r.sim_score,
                tag = r.tag_score,
                total = r.total_score,
                "Search candidate"
            );
        }

        // Stable: ties keep the store's bm25/sim/tag order
        results.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));

        if let Some(reranker) = reranker {
            if !results.is_empty() {
                let candidates = results.len();
                results = match reranker.rerank(query, results).await? {
                    RerankOutcome::Ranked(ranked) => {
                        tracing::debug!(candidates, kept = ranked.len(), "Reranked results");
                        ranked
                    }
                    RerankOutcome::Degraded => {
                        tracing::warn!(
                            query = %query,
                            model = %reranker.model_name(),
                            "Rerank output unparseable, returning no results"
                        );
                        Vec::new()
                    }
                };
            }
        }

        tracing::info!(query = %query, count = results.len(), precision = request.precision, "Search completed");

        Ok(SearchResponse {
            query: query.to_string(),
            count: results.len(),
            results,
        })
    }
}
