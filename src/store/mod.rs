/// Bookmark store abstraction layer
///
/// Provides the BookmarkStore trait and associated types for bookmark persistence
/// and the filtered hybrid (lexical + vector) candidate query.
/// PostgreSQL + pgvector is the production backend; the in-memory backend
/// implements the same contract for tests and offline use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::TagscopeError;

pub mod memory;
pub mod postgres;

/// Closed set of site categories a bookmark can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum SourceType {
    Social,
    Media,
    Portal,
    Blog,
    News,
    Tool,
    Public,
    #[default]
    Etc,
}

impl SourceType {
    pub const ALL: [SourceType; 8] = [
        SourceType::Social,
        SourceType::Media,
        SourceType::Portal,
        SourceType::Blog,
        SourceType::News,
        SourceType::Tool,
        SourceType::Public,
        SourceType::Etc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Social => "Social",
            SourceType::Media => "Media",
            SourceType::Portal => "Portal",
            SourceType::Blog => "Blog",
            SourceType::News => "News",
            SourceType::Tool => "Tool",
            SourceType::Public => "Public",
            SourceType::Etc => "Etc",
        }
    }

    /// Parse a label from a model or the database; anything unknown is `Etc`.
    pub fn parse_lenient(s: &str) -> SourceType {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    /// Case-insensitive match against the eight labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        SourceType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| {
                format!(
                    "Unknown source type '{}': expected one of Social, Media, Portal, Blog, News, Tool, Public, Etc",
                    needle
                )
            })
    }
}

/// A stored bookmark. `link` is unique across the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub link: String,
    pub summary: Option<String>,
    /// Embedding of `summary`; None until enrichment succeeds
    pub embedding_summary: Option<Vec<f32>>,
    /// Embedding of the space-joined tag list
    pub embedding_tags: Option<Vec<f32>>,
    pub base_url: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub source_type: SourceType,
    pub image_url: Option<String>,
}

impl Bookmark {
    /// Both vector channels are present, so the record is searchable.
    pub fn is_searchable(&self) -> bool {
        self.embedding_summary.is_some() && self.embedding_tags.is_some()
    }
}

/// In-place edit of an existing bookmark. Embeddings are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkEdit {
    pub new_link: String,
    pub new_summary: String,
}

/// Filter criteria for listing bookmarks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFilter {
    pub source_type: Option<SourceType>,
    /// Maximum rows to return; all rows when None
    pub limit: Option<i64>,
}

/// Inputs of the filtered hybrid candidate query.
#[derive(Debug, Clone)]
pub struct HybridQuery {
    /// Plain keyword query for full-text ranking
    pub lexical_query: String,
    /// Compared against `embedding_summary`
    pub summary_vector: Vec<f32>,
    /// Compared against `embedding_tags`
    pub tag_vector: Vec<f32>,
    /// `source_type` must be one of these (set membership)
    pub type_filter: Option<Vec<SourceType>>,
    /// Tag list must share at least one entry with these
    pub tag_filter: Option<Vec<String>>,
    pub limit: i64,
}

/// One row of the hybrid query: the bookmark (vectors omitted) plus its raw scores.
#[derive(Debug, Clone)]
pub struct ScoredBookmark {
    pub bookmark: Bookmark,
    pub bm25_score: f64,
    pub sim_score: f64,
    pub tag_score: f64,
}

/// Core abstraction for bookmark persistence operations.
///
/// All implementations must be Send + Sync to support concurrent access.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Insert a bookmark unless its link already exists.
    ///
    /// Returns true when a row was written, false on a duplicate link.
    async fn insert(&self, bookmark: &Bookmark) -> Result<bool, TagscopeError>;

    /// List bookmarks, newest first (timestamp DESC, nulls last).
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Bookmark>, TagscopeError>;

    /// Replace link and summary of the bookmark at `original_link`.
    ///
    /// Returns NotFound if no bookmark has that link.
    async fn update(&self, original_link: &str, edit: &BookmarkEdit) -> Result<(), TagscopeError>;

    /// Delete by exact link. Returns the number of rows removed (0 or 1).
    async fn delete(&self, link: &str) -> Result<u64, TagscopeError>;

    /// Total number of stored bookmarks.
    async fn count(&self) -> Result<u64, TagscopeError>;

    /// Filtered candidate retrieval with per-row lexical and vector scores.
    ///
    /// Only rows with both embeddings are considered. Rows come back ordered by
    /// bm25_score DESC, sim_score DESC, tag_score DESC and truncated to `limit`.
    async fn query_hybrid(&self, query: &HybridQuery) -> Result<Vec<ScoredBookmark>, TagscopeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_type_parse_is_case_insensitive() {
        assert_eq!("blog".parse::<SourceType>(), Ok(SourceType::Blog));
        assert_eq!(" NEWS ".parse::<SourceType>(), Ok(SourceType::News));
        assert!("Podcast".parse::<SourceType>().is_err());
    }

    #[test]
    fn test_source_type_lenient_defaults_to_etc() {
        assert_eq!(SourceType::parse_lenient("Tool"), SourceType::Tool);
        assert_eq!(SourceType::parse_lenient("Social|Media"), SourceType::Etc);
        assert_eq!(SourceType::parse_lenient(""), SourceType::Etc);
    }

    #[test]
    fn test_source_type_serializes_as_label() {
        assert_eq!(serde_json::to_value(SourceType::Portal).unwrap(), "Portal");
    }
}
