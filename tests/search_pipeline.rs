//! End-to-end search and ingestion behaviour over the in-memory store,
//! with deterministic stand-ins for the embedding service, the model and the web.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tagscope::config::{EnrichmentConfig, SearchConfig};
use tagscope::embedding::{EmbeddingError, EmbeddingProvider};
use tagscope::enrichment::{Enricher, EnrichmentError, PageFetcher};
use tagscope::errors::TagscopeError;
use tagscope::generation::{GenerationError, GenerativeModel};
use tagscope::ingest::{IngestOutcome, Ingestor};
use tagscope::search::{HybridSearch, Reranker, SearchRequest, SearchResponse};
use tagscope::store::memory::InMemoryBookmarkStore;
use tagscope::store::{Bookmark, BookmarkStore, ListFilter, SourceType};

const AXES: [&str; 4] = ["rust", "go", "news", "cook"];

/// Keyword-count embedder: one axis per entry in AXES.
struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let lower = text.to_lowercase();
        let v: Vec<f32> = AXES.iter().map(|k| lower.matches(k).count() as f32).collect();
        if v.iter().all(|x| *x == 0.0) {
            Ok(vec![0.1; AXES.len()])
        } else {
            Ok(v)
        }
    }

    fn model_name(&self) -> &str {
        "keyword"
    }

    fn dimension(&self) -> usize {
        AXES.len()
    }
}

struct DownEmbedder;

#[async_trait]
impl EmbeddingProvider for DownEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Api {
            status: 503,
            message: "unavailable".to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "down"
    }

    fn dimension(&self) -> usize {
        AXES.len()
    }
}

/// Replies with a fixed text, or fails with an API error when `reply` is None.
struct ScriptedModel {
    reply: Option<&'static str>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn replying(reply: &'static str) -> Arc<Self> {
        Arc::new(ScriptedModel {
            reply: Some(reply),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(ScriptedModel {
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Some(text) => Ok(text.to_string()),
            None => Err(GenerationError::Api {
                status: 500,
                message: "model exploded".to_string(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Serves a page whose title is the URL path, or fails for hosts ending in ".down".
struct FakeWeb;

#[async_trait]
impl PageFetcher for FakeWeb {
    async fn fetch(&self, url: &str) -> Result<String, EnrichmentError> {
        if url.contains(".down") {
            return Err(EnrichmentError::Fetch("connection refused".to_string()));
        }
        let title = url.rsplit('/').next().unwrap_or_default().replace('-', " ");
        Ok(format!(
            "<html><head><title>{}</title><meta property=\"og:image\" content=\"{}/cover.png\"></head></html>",
            title, url
        ))
    }
}

async fn seeded_store() -> Arc<InMemoryBookmarkStore> {
    let store = Arc::new(InMemoryBookmarkStore::new());
    let embedder = KeywordEmbedder;

    let rows: [(&str, &str, SourceType, &[&str]); 4] = [
        ("https://a.dev/rust", "rust ownership guide", SourceType::Blog, &["rust", "memory"]),
        ("https://b.dev/go", "go concurrency patterns", SourceType::Blog, &["go", "concurrency"]),
        ("https://c.dev/tool", "rust cargo tool for rust builds", SourceType::Tool, &["rust", "build"]),
        ("https://d.dev/cook", "cook pasta at home", SourceType::Media, &["cook", "food"]),
    ];

    for (link, summary, source_type, tags) in rows {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let bookmark = Bookmark {
            link: link.to_string(),
            summary: Some(summary.to_string()),
            embedding_summary: Some(embedder.embed(summary).await.unwrap()),
            embedding_tags: Some(embedder.embed(&tags.join(" ")).await.unwrap()),
            base_url: None,
            timestamp: None,
            tags,
            source_type,
            image_url: None,
        };
        assert!(store.insert(&bookmark).await.unwrap());
    }

    // Not yet embedded: must never surface in search
    store
        .insert(&Bookmark {
            link: "https://e.dev/rust-draft".to_string(),
            summary: Some("rust draft".to_string()),
            embedding_summary: None,
            embedding_tags: None,
            base_url: None,
            timestamp: None,
            tags: vec!["rust".to_string()],
            source_type: SourceType::Blog,
            image_url: None,
        })
        .await
        .unwrap();

    store
}

async fn insert_embedded(store: &InMemoryBookmarkStore, link: &str, summary: &str, tags: &[&str]) {
    let embedder = KeywordEmbedder;
    let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
    let bookmark = Bookmark {
        link: link.to_string(),
        summary: Some(summary.to_string()),
        embedding_summary: Some(embedder.embed(summary).await.unwrap()),
        embedding_tags: Some(embedder.embed(&tags.join(" ")).await.unwrap()),
        base_url: None,
        timestamp: None,
        tags,
        source_type: SourceType::Blog,
        image_url: None,
    };
    assert!(store.insert(&bookmark).await.unwrap());
}

fn search_over(store: Arc<InMemoryBookmarkStore>, reranker: Option<Reranker>) -> HybridSearch {
    HybridSearch::new(Arc::new(KeywordEmbedder), store, reranker, SearchConfig::default())
}

fn request(query: &str) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        ..Default::default()
    }
}

fn links(response: &SearchResponse) -> Vec<&str> {
    response.results.iter().map(|r| r.link.as_str()).collect()
}

#[tokio::test]
async fn test_lexical_match_ranks_first() {
    let search = search_over(seeded_store().await, None);
    let response = search.search(&request("rust")).await.unwrap();

    let a = response.results.iter().position(|r| r.link == "https://a.dev/rust").unwrap();
    let b = response.results.iter().position(|r| r.link == "https://b.dev/go").unwrap();
    assert!(a < b);
    assert!(response.results[a].bm25_score > 0.0);
    assert_eq!(response.results[b].bm25_score, 0.0);
}

#[tokio::test]
async fn test_results_sorted_bounded_and_summed() {
    let search = search_over(seeded_store().await, None);
    let mut req = request("rust tool");
    req.top_n = Some(3);
    let response = search.search(&req).await.unwrap();

    assert_eq!(response.count, response.results.len());
    assert!(response.count <= 3);
    for pair in response.results.windows(2) {
        assert!(pair[0].total_score >= pair[1].total_score);
    }
    for r in &response.results {
        let sum = r.bm25_score + r.sim_score + r.tag_score;
        assert!((r.total_score - sum).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_unembedded_bookmarks_never_returned() {
    let search = search_over(seeded_store().await, None);
    let mut req = request("rust draft");
    req.top_n = Some(100);
    let response = search.search(&req).await.unwrap();
    assert_eq!(response.count, 4);
    assert!(!links(&response).contains(&"https://e.dev/rust-draft"));
}

#[tokio::test]
async fn test_type_filter_without_matches_is_empty() {
    let search = search_over(seeded_store().await, None);
    let mut req = request("rust");
    req.type_filter = Some(vec![SourceType::News]);
    let response = search.search(&req).await.unwrap();
    assert_eq!(response.count, 0);
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn test_type_and_tag_filters_are_respected() {
    let search = search_over(seeded_store().await, None);

    let mut req = request("rust");
    req.type_filter = Some(vec![SourceType::Tool, SourceType::Media]);
    let response = search.search(&req).await.unwrap();
    assert!(response
        .results
        .iter()
        .all(|r| matches!(r.source_type, SourceType::Tool | SourceType::Media)));
    assert_eq!(response.count, 2);

    let mut req = request("anything");
    req.tag_filter = Some(vec!["food".to_string(), "concurrency".to_string()]);
    let response = search.search(&req).await.unwrap();
    let mut found = links(&response);
    found.sort();
    assert_eq!(found, vec!["https://b.dev/go", "https://d.dev/cook"]);
}

#[tokio::test]
async fn test_invalid_arguments() {
    let search = search_over(seeded_store().await, None);

    let err = search.search(&request("  ")).await.unwrap_err();
    assert!(matches!(err, TagscopeError::InvalidArgument { .. }));

    let mut req = request("rust");
    req.top_n = Some(0);
    let err = search.search(&req).await.unwrap_err();
    assert!(matches!(err, TagscopeError::InvalidArgument { .. }));
}

#[tokio::test]
async fn test_top_n_is_capped() {
    let store = seeded_store().await;
    let search = HybridSearch::new(
        Arc::new(KeywordEmbedder),
        store,
        None,
        SearchConfig {
            default_top_n: 10,
            max_top_n: 2,
        },
    );
    let mut req = request("rust");
    req.top_n = Some(50);
    assert_eq!(search.search(&req).await.unwrap().count, 2);
}

#[tokio::test]
async fn test_page_is_cut_by_lexical_rank_before_total_sort() {
    let store = Arc::new(InMemoryBookmarkStore::new());
    // Exact keyword hit, weak vectors
    insert_embedded(&store, "https://x.dev/lexical", "rust cook cook cook", &["cook", "food"]).await;
    // No lexical hit ("rusty" is another token), strong vectors
    insert_embedded(&store, "https://y.dev/semantic", "rusty crab", &["rusty"]).await;
    let search = search_over(store, None);

    let mut req = request("rust");
    req.top_n = Some(1);
    let response = search.search(&req).await.unwrap();
    assert_eq!(links(&response), vec!["https://x.dev/lexical"]);
    assert!(response.results[0].bm25_score > 0.0);

    let response = search.search(&request("rust")).await.unwrap();
    assert_eq!(links(&response), vec!["https://y.dev/semantic", "https://x.dev/lexical"]);
    assert_eq!(response.results[0].bm25_score, 0.0);
    assert!(response.results[0].total_score > response.results[1].total_score);
}

#[tokio::test]
async fn test_equal_totals_keep_store_order() {
    let store = Arc::new(InMemoryBookmarkStore::new());
    insert_embedded(&store, "https://tie.dev/b", "rusty one", &["rusty"]).await;
    insert_embedded(&store, "https://tie.dev/a", "rusty two", &["rusty"]).await;
    let search = search_over(store, None);

    let response = search.search(&request("rust")).await.unwrap();
    assert_eq!(response.results[0].total_score, response.results[1].total_score);
    assert_eq!(links(&response), vec!["https://tie.dev/b", "https://tie.dev/a"]);
}

#[tokio::test]
async fn test_empty_rerank_reply_returns_zero_results() {
    let model = ScriptedModel::replying("");
    let search = search_over(seeded_store().await, Some(Reranker::new(model)));
    let mut req = request("rust");
    req.precision = true;
    let response = search.search(&req).await.unwrap();
    assert_eq!(response.count, 0);
}

#[tokio::test]
async fn test_embedding_failure_is_dependency_error() {
    let search = HybridSearch::new(
        Arc::new(DownEmbedder),
        seeded_store().await,
        None,
        SearchConfig::default(),
    );
    let err = search.search(&request("rust")).await.unwrap_err();
    assert!(err.is_dependency_unavailable());
}

#[tokio::test]
async fn test_precision_reorders_and_drops() {
    let model = ScriptedModel::replying(r#"{"relevant": [2, 99, 1]}"#);
    let search = search_over(seeded_store().await, Some(Reranker::new(model.clone())));

    let plain = search.search(&request("rust")).await.unwrap();
    let mut req = request("rust");
    req.precision = true;
    let precise = search.search(&req).await.unwrap();

    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(precise.count, 2);
    assert_eq!(precise.results[0].link, plain.results[1].link);
    assert_eq!(precise.results[1].link, plain.results[0].link);
}

#[tokio::test]
async fn test_unparseable_rerank_returns_zero_results() {
    let model = ScriptedModel::replying("All of these look relevant, honestly.");
    let search = search_over(seeded_store().await, Some(Reranker::new(model)));

    let mut req = request("rust");
    req.precision = true;
    let response = search.search(&req).await.unwrap();
    assert_eq!(response.count, 0);
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn test_rerank_model_failure_propagates() {
    let search = search_over(seeded_store().await, Some(Reranker::new(ScriptedModel::failing())));
    let mut req = request("rust");
    req.precision = true;
    let err = search.search(&req).await.unwrap_err();
    assert!(err.is_dependency_unavailable());
}

#[tokio::test]
async fn test_precision_without_model_is_unavailable() {
    let search = search_over(seeded_store().await, None);
    let mut req = request("rust");
    req.precision = true;
    let err = search.search(&req).await.unwrap_err();
    assert!(err.is_dependency_unavailable());
}

#[tokio::test]
async fn test_precision_skips_model_on_empty_page() {
    let model = ScriptedModel::replying(r#"{"relevant": [1]}"#);
    let search = search_over(seeded_store().await, Some(Reranker::new(model.clone())));
    let mut req = request("rust");
    req.precision = true;
    req.type_filter = Some(vec![SourceType::News]);
    assert_eq!(search.search(&req).await.unwrap().count, 0);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

// Ingestion

fn ingestor_with(model: Arc<ScriptedModel>, store: Arc<InMemoryBookmarkStore>) -> Ingestor {
    let enricher = Enricher::new(model, Arc::new(FakeWeb), &EnrichmentConfig::default());
    Ingestor::new(Some(enricher), Arc::new(KeywordEmbedder), store)
}

const ENRICHED: &str =
    r#"{"summary": "rust async book", "tags": ["rust", "async", "rust", " "], "source_type": "Blog"}"#;

#[tokio::test]
async fn test_ingest_then_duplicate() {
    let store = Arc::new(InMemoryBookmarkStore::new());
    let ingestor = ingestor_with(ScriptedModel::replying(ENRICHED), store.clone());

    let url = "https://rust.dev/async-book";
    assert_eq!(ingestor.ingest(url).await.unwrap(), IngestOutcome::Inserted);
    assert_eq!(ingestor.ingest(url).await.unwrap(), IngestOutcome::Duplicate);
    assert_eq!(store.count().await.unwrap(), 1);

    let stored = &store.list(&ListFilter::default()).await.unwrap()[0];
    assert_eq!(stored.summary.as_deref(), Some("rust async book"));
    assert_eq!(stored.tags, vec!["rust", "async"]);
    assert_eq!(stored.source_type, SourceType::Blog);
    assert_eq!(stored.base_url.as_deref(), Some("rust.dev"));
    assert_eq!(stored.image_url.as_deref(), Some("https://rust.dev/async-book/cover.png"));
    assert!(stored.is_searchable());
    assert!(stored.timestamp.is_some());
}

#[tokio::test]
async fn test_malformed_enrichment_falls_back_to_title() {
    let store = Arc::new(InMemoryBookmarkStore::new());
    let ingestor = ingestor_with(ScriptedModel::replying("sorry, no JSON today"), store.clone());

    ingestor.ingest("https://blog.dev/cooking-with-rust").await.unwrap();
    let stored = &store.list(&ListFilter::default()).await.unwrap()[0];
    assert_eq!(stored.summary.as_deref(), Some("cooking with rust"));
    assert_eq!(stored.tags, vec!["cooking with rust"]);
    assert_eq!(stored.source_type, SourceType::Etc);
    assert!(stored.image_url.is_some());
}

#[tokio::test]
async fn test_unreachable_page_falls_back_to_domain() {
    let store = Arc::new(InMemoryBookmarkStore::new());
    let model = ScriptedModel::replying(ENRICHED);
    let ingestor = ingestor_with(model.clone(), store.clone());

    ingestor.ingest("https://site.down/post").await.unwrap();
    let stored = &store.list(&ListFilter::default()).await.unwrap()[0];
    assert_eq!(stored.summary.as_deref(), Some("site.down"));
    assert_eq!(stored.tags, vec!["site.down"]);
    assert_eq!(stored.image_url, None);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_model_failure_stops_batch() {
    let store = Arc::new(InMemoryBookmarkStore::new());
    let ingestor = ingestor_with(ScriptedModel::failing(), store.clone());

    let urls = vec!["https://a.dev/one".to_string(), "https://a.dev/two".to_string()];
    let err = ingestor.ingest_many(&urls).await.unwrap_err();
    assert!(err.is_dependency_unavailable());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_ingest_many_counts() {
    let store = Arc::new(InMemoryBookmarkStore::new());
    let ingestor = ingestor_with(ScriptedModel::replying(ENRICHED), store.clone());

    let urls = vec![
        "https://a.dev/one".to_string(),
        " https://a.dev/one ".to_string(),
        "https://a.dev/two".to_string(),
    ];
    let summary = ingestor.ingest_many(&urls).await.unwrap();
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.duplicates, 1);

    assert!(matches!(
        ingestor.ingest_many(&[]).await,
        Err(TagscopeError::InvalidArgument { .. })
    ));
}

#[tokio::test]
async fn test_ingest_without_model_is_unavailable() {
    let store = Arc::new(InMemoryBookmarkStore::new());
    let ingestor = Ingestor::new(None, Arc::new(KeywordEmbedder), store.clone());
    let err = ingestor.ingest("https://a.dev/x").await.unwrap_err();
    assert!(err.is_dependency_unavailable());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_ingested_bookmark_is_searchable() {
    let store = Arc::new(InMemoryBookmarkStore::new());
    let ingestor = ingestor_with(ScriptedModel::replying(ENRICHED), store.clone());
    ingestor.ingest("https://rust.dev/async-book").await.unwrap();

    let search = search_over(store, None);
    let response = search.search(&request("rust")).await.unwrap();
    assert_eq!(links(&response), vec!["https://rust.dev/async-book"]);
}

#[tokio::test]
async fn test_update_and_remove() {
    let store = seeded_store().await;
    let ingestor = Ingestor::new(None, Arc::new(KeywordEmbedder), store.clone());

    let err = ingestor
        .update("https://missing.dev", "https://x.dev", "x")
        .await
        .unwrap_err();
    assert!(matches!(err, TagscopeError::NotFound { .. }));

    ingestor
        .update("  https://a.dev/rust  ", "https://a.dev/rust-2", "rust ownership, revised")
        .await
        .unwrap();
    let err = ingestor
        .update("https://a.dev/rust-2", "https://b.dev/go", "clash")
        .await
        .unwrap_err();
    assert!(err.is_dependency_unavailable());

    let removed = ingestor
        .remove(&["https://a.dev/rust-2".to_string(), "https://nope.dev".to_string()])
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.count().await.unwrap(), 4);

    let blogs = ingestor
        .list(&ListFilter {
            source_type: Some(SourceType::Blog),
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(blogs.len(), 2);
}
