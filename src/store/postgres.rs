/// PostgreSQL-backed implementation of BookmarkStore
///
/// Uses sqlx with PgPool for connection pooling and pgvector for the two
/// embedding columns. Lexical relevance is `ts_rank_cd` over a 'simple'
/// tsvector of the summary; vector similarity is `1 - cosine distance` (`<=>`),
/// which the HNSW `vector_cosine_ops` indexes serve.

use async_trait::async_trait;
use sqlx::{
    postgres::{PgPool, PgPoolOptions, PgRow},
    Row,
};
use std::time::Duration;

use crate::errors::TagscopeError;
use crate::store::{
    Bookmark, BookmarkEdit, BookmarkStore, HybridQuery, ListFilter, ScoredBookmark, SourceType,
};

const BOOKMARK_COLUMNS: &str =
    "link, summary, embedding_summary, embedding_tags, base_url, timestamp, tags, source_type, image_url";

/// PostgreSQL-backed bookmark store using sqlx connection pool.
pub struct PostgresBookmarkStore {
    pool: PgPool,
}

impl PostgresBookmarkStore {
    /// Connect to the PostgreSQL database at database_url.
    ///
    /// If run_migrations is true, automatically runs pending migrations on startup.
    pub async fn new(database_url: &str, run_migrations: bool) -> Result<Self, TagscopeError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await
            .map_err(|e| TagscopeError::store(format!("Failed to connect to database: {}", e)))?;

        if run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| TagscopeError::store(format!("Migration failed: {}", e)))?;
        }

        Ok(PostgresBookmarkStore { pool })
    }

    /// Return the underlying PgPool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn store_err(e: sqlx::Error) -> TagscopeError {
    TagscopeError::store(e.to_string())
}

/// Map a full bookmark row (all BOOKMARK_COLUMNS) to a Bookmark.
fn row_to_bookmark(row: &PgRow) -> Result<Bookmark, TagscopeError> {
    let embedding_summary: Option<pgvector::Vector> =
        row.try_get("embedding_summary").map_err(store_err)?;
    let embedding_tags: Option<pgvector::Vector> =
        row.try_get("embedding_tags").map_err(store_err)?;

    let mut bookmark = row_to_bookmark_without_vectors(row)?;
    bookmark.embedding_summary = embedding_summary.map(|v| v.to_vec());
    bookmark.embedding_tags = embedding_tags.map(|v| v.to_vec());
    Ok(bookmark)
}

/// Map a row that does not select the vector columns.
fn row_to_bookmark_without_vectors(row: &PgRow) -> Result<Bookmark, TagscopeError> {
    let source_type: String = row.try_get("source_type").map_err(store_err)?;
    let tags: Option<Vec<String>> = row.try_get("tags").map_err(store_err)?;

    Ok(Bookmark {
        link: row.try_get("link").map_err(store_err)?,
        summary: row.try_get("summary").map_err(store_err)?,
        embedding_summary: None,
        embedding_tags: None,
        base_url: row.try_get("base_url").map_err(store_err)?,
        timestamp: row.try_get("timestamp").map_err(store_err)?,
        tags: tags.unwrap_or_default(),
        source_type: SourceType::parse_lenient(&source_type),
        image_url: row.try_get("image_url").map_err(store_err)?,
    })
}

/// Build the hybrid candidate SQL.
///
/// Parameter layout: $1 lexical query, $2 summary vector, $3 tag vector,
/// then the type filter and tag filter when present, then the limit.
fn build_hybrid_sql(has_type_filter: bool, has_tag_filter: bool) -> String {
    let mut conditions = vec![
        "embedding_summary IS NOT NULL".to_string(),
        "embedding_tags IS NOT NULL".to_string(),
    ];
    let mut param_idx: u32 = 4;

    if has_type_filter {
        conditions.push(format!("source_type = ANY(${}::text[])", param_idx));
        param_idx += 1;
    }
    if has_tag_filter {
        conditions.push(format!("tags && ${}::text[]", param_idx));
        param_idx += 1;
    }

    format!(
        "SELECT link, summary, base_url, timestamp, tags, source_type, image_url, \
                ts_rank_cd(to_tsvector('simple', coalesce(summary, '')), plainto_tsquery('simple', $1))::float8 AS bm25_score, \
                (1 - (embedding_summary <=> $2))::float8 AS sim_score, \
                (1 - (embedding_tags <=> $3))::float8 AS tag_score \
         FROM bookmarks \
         WHERE {} \
         ORDER BY bm25_score DESC NULLS LAST, sim_score DESC NULLS LAST, tag_score DESC NULLS LAST \
         LIMIT ${}",
        conditions.join(" AND "),
        param_idx
    )
}

#[async_trait]
impl BookmarkStore for PostgresBookmarkStore {
    async fn insert(&self, bookmark: &Bookmark) -> Result<bool, TagscopeError> {
        let embedding_summary = bookmark.embedding_summary.clone().map(pgvector::Vector::from);
        let embedding_tags = bookmark.embedding_tags.clone().map(pgvector::Vector::from);

        let result = sqlx::query(
            "INSERT INTO bookmarks \
             (link, summary, embedding_summary, embedding_tags, base_url, timestamp, tags, source_type, image_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (link) DO NOTHING",
        )
        .bind(&bookmark.link)
        .bind(&bookmark.summary)
        .bind(embedding_summary)
        .bind(embedding_tags)
        .bind(&bookmark.base_url)
        .bind(bookmark.timestamp)
        .bind(&bookmark.tags)
        .bind(bookmark.source_type.as_str())
        .bind(&bookmark.image_url)
        .execute(&self.pool)
        .await
        .map_err(|e| TagscopeError::store(format!("Failed to insert bookmark: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Bookmark>, TagscopeError> {
        let mut sql = format!("SELECT {} FROM bookmarks", BOOKMARK_COLUMNS);
        let mut param_idx: u32 = 1;

        if filter.source_type.is_some() {
            sql.push_str(&format!(" WHERE source_type = ${}", param_idx));
            param_idx += 1;
        }
        sql.push_str(" ORDER BY timestamp DESC NULLS LAST, link ASC");
        if filter.limit.is_some() {
            sql.push_str(&format!(" LIMIT ${}", param_idx));
        }

        let mut q = sqlx::query(&sql);
        if let Some(source_type) = filter.source_type {
            q = q.bind(source_type.as_str());
        }
        if let Some(limit) = filter.limit {
            q = q.bind(limit.max(0));
        }

        let rows = q.fetch_all(&self.pool).await.map_err(store_err)?;
        rows.iter().map(row_to_bookmark).collect()
    }

    async fn update(&self, original_link: &str, edit: &BookmarkEdit) -> Result<(), TagscopeError> {
        let result = sqlx::query("UPDATE bookmarks SET link = $1, summary = $2 WHERE link = $3")
            .bind(&edit.new_link)
            .bind(&edit.new_summary)
            .bind(original_link)
            .execute(&self.pool)
            .await
            .map_err(|e| TagscopeError::store(format!("Failed to update bookmark: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(TagscopeError::NotFound {
                link: original_link.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, link: &str) -> Result<u64, TagscopeError> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE link = $1")
            .bind(link)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, TagscopeError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM bookmarks")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        let count: i64 = row.try_get("count").map_err(store_err)?;
        Ok(count.max(0) as u64)
    }

    async fn query_hybrid(&self, query: &HybridQuery) -> Result<Vec<ScoredBookmark>, TagscopeError> {
        let sql = build_hybrid_sql(query.type_filter.is_some(), query.tag_filter.is_some());

        let mut q = sqlx::query(&sql)
            .bind(&query.lexical_query)
            .bind(pgvector::Vector::from(query.summary_vector.clone()))
            .bind(pgvector::Vector::from(query.tag_vector.clone()));

        if let Some(ref types) = query.type_filter {
            let labels: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
            q = q.bind(labels);
        }
        if let Some(ref tags) = query.tag_filter {
            q = q.bind(tags);
        }
        q = q.bind(query.limit);

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TagscopeError::store(format!("Hybrid query failed: {}", e)))?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let bm25_score: Option<f64> = row.try_get("bm25_score").map_err(store_err)?;
            let sim_score: Option<f64> = row.try_get("sim_score").map_err(store_err)?;
            let tag_score: Option<f64> = row.try_get("tag_score").map_err(store_err)?;
            scored.push(ScoredBookmark {
                bookmark: row_to_bookmark_without_vectors(row)?,
                bm25_score: bm25_score.unwrap_or(0.0),
                sim_score: sim_score.unwrap_or(0.0),
                tag_score: tag_score.unwrap_or(0.0),
            });
        }

        Ok(scored)
    }
}
