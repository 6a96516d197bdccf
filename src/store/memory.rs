/// In-process implementation of BookmarkStore
///
/// Holds bookmarks in a Vec behind a tokio RwLock and answers the hybrid query
/// with the same predicate, score definitions and ordering as the PostgreSQL
/// backend. Full-text ranking is approximated: 'simple' tokenisation (lowercase,
/// split on non-alphanumerics), AND semantics across query terms like
/// `plainto_tsquery`, and 0.1 per matching cover like `ts_rank_cd` with default weights.
/// Meant for tests and small offline collections, not for large corpora.

use async_trait::async_trait;
use std::cmp::Ordering;
use tokio::sync::RwLock;

use crate::errors::TagscopeError;
use crate::store::{Bookmark, BookmarkEdit, BookmarkStore, HybridQuery, ListFilter, ScoredBookmark};

/// Rank contributed by each cover, matching ts_rank_cd's default D-weight.
const COVER_WEIGHT: f64 = 0.1;

#[derive(Default)]
pub struct InMemoryBookmarkStore {
    bookmarks: RwLock<Vec<Bookmark>>,
}

impl InMemoryBookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Cover-density style lexical score of `document` for a plain keyword query.
///
/// Zero unless every query term occurs; otherwise 0.1 per complete cover, where
/// the cover count is the occurrence count of the rarest query term.
pub fn lexical_score(document: &str, query: &str) -> f64 {
    let mut terms = tokenize(query);
    terms.sort();
    terms.dedup();
    if terms.is_empty() {
        return 0.0;
    }

    let doc_tokens = tokenize(document);
    let covers = terms
        .iter()
        .map(|term| doc_tokens.iter().filter(|t| *t == term).count())
        .min()
        .unwrap_or(0);

    covers as f64 * COVER_WEIGHT
}

/// Cosine distance in [0, 2]; 1.0 when either vector has zero norm.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f64, TagscopeError> {
    if a.len() != b.len() {
        return Err(TagscopeError::store(format!(
            "different vector dimensions {} and {}",
            a.len(),
            b.len()
        )));
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(1.0);
    }
    Ok(1.0 - dot / (norm_a.sqrt() * norm_b.sqrt()))
}

fn without_vectors(bookmark: &Bookmark) -> Bookmark {
    Bookmark {
        embedding_summary: None,
        embedding_tags: None,
        ..bookmark.clone()
    }
}

fn newest_first(a: &Bookmark, b: &Bookmark) -> Ordering {
    match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.link.cmp(&b.link))
}

#[async_trait]
impl BookmarkStore for InMemoryBookmarkStore {
    async fn insert(&self, bookmark: &Bookmark) -> Result<bool, TagscopeError> {
        let mut bookmarks = self.bookmarks.write().await;
        if bookmarks.iter().any(|b| b.link == bookmark.link) {
            return Ok(false);
        }
        bookmarks.push(bookmark.clone());
        Ok(true)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Bookmark>, TagscopeError> {
        let bookmarks = self.bookmarks.read().await;
        let mut listed: Vec<Bookmark> = bookmarks
            .iter()
            .filter(|b| filter.source_type.map_or(true, |t| b.source_type == t))
            .cloned()
            .collect();
        listed.sort_by(newest_first);
        if let Some(limit) = filter.limit {
            listed.truncate(limit.max(0) as usize);
        }
        Ok(listed)
    }

    async fn update(&self, original_link: &str, edit: &BookmarkEdit) -> Result<(), TagscopeError> {
        let mut bookmarks = self.bookmarks.write().await;
        let index = bookmarks
            .iter()
            .position(|b| b.link == original_link)
            .ok_or_else(|| TagscopeError::NotFound {
                link: original_link.to_string(),
            })?;
        let clash = bookmarks
            .iter()
            .enumerate()
            .any(|(i, b)| i != index && b.link == edit.new_link);
        if clash {
            return Err(TagscopeError::store(format!(
                "duplicate key value violates unique constraint: link '{}' already exists",
                edit.new_link
            )));
        }
        let bookmark = &mut bookmarks[index];
        bookmark.link = edit.new_link.clone();
        bookmark.summary = Some(edit.new_summary.clone());
        Ok(())
    }

    async fn delete(&self, link: &str) -> Result<u64, TagscopeError> {
        let mut bookmarks = self.bookmarks.write().await;
        let before = bookmarks.len();
        bookmarks.retain(|b| b.link != link);
        Ok((before - bookmarks.len()) as u64)
    }

    async fn count(&self) -> Result<u64, TagscopeError> {
        Ok(self.bookmarks.read().await.len() as u64)
    }

    async fn query_hybrid(&self, query: &HybridQuery) -> Result<Vec<ScoredBookmark>, TagscopeError> {
        let bookmarks = self.bookmarks.read().await;
        let mut scored = Vec::new();

        for bookmark in bookmarks.iter() {
            let (Some(summary_vec), Some(tags_vec)) =
                (&bookmark.embedding_summary, &bookmark.embedding_tags)
            else {
                continue;
            };
            if let Some(ref types) = query.type_filter {
                if !types.contains(&bookmark.source_type) {
                    continue;
                }
            }
            if let Some(ref wanted) = query.tag_filter {
                if !bookmark.tags.iter().any(|t| wanted.contains(t)) {
                    continue;
                }
            }

            let summary = bookmark.summary.as_deref().unwrap_or("");
            scored.push(ScoredBookmark {
                bookmark: without_vectors(bookmark),
                bm25_score: lexical_score(summary, &query.lexical_query),
                sim_score: 1.0 - cosine_distance(summary_vec, &query.summary_vector)?,
                tag_score: 1.0 - cosine_distance(tags_vec, &query.tag_vector)?,
            });
        }

        scored.sort_by(|a, b| {
            b.bm25_score
                .total_cmp(&a.bm25_score)
                .then_with(|| b.sim_score.total_cmp(&a.sim_score))
                .then_with(|| b.tag_score.total_cmp(&a.tag_score))
        });
        scored.truncate(query.limit.max(0) as usize);
        Ok(scored)
    }
}
