use rmcp::{
    ServerHandler,
    tool,
    model::{
        ServerCapabilities, Implementation, ProtocolVersion, CallToolResult,
        RawResource, ListResourcesResult, ReadResourceResult, ResourceContents,
        ReadResourceRequestParams, AnnotateAble,
    },
    handler::server::wrapper::Parameters,
    service::{RequestContext, RoleServer},
    ErrorData as McpError,
};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::errors::TagscopeError;
use crate::generation::GenerativeModel;
use crate::ingest::Ingestor;
use crate::search::{parse_tag_filter, parse_type_filter, HybridSearch, SearchRequest};
use crate::store::{Bookmark, BookmarkStore, ListFilter, SourceType};

const MODEL_TEST_PROMPT: &str =
    "Reply with a JSON object {\"status\": \"ok\", \"greeting\": \"<one short sentence>\"}.";

pub struct BookmarkService {
    search: Arc<HybridSearch>,
    ingestor: Arc<Ingestor>,
    store: Arc<dyn BookmarkStore>,
    /// Model exercised by test_model; None when generation is not configured
    model: Option<Arc<dyn GenerativeModel>>,
    start_time: Instant,
}

impl BookmarkService {
    pub fn new(
        search: Arc<HybridSearch>,
        ingestor: Arc<Ingestor>,
        store: Arc<dyn BookmarkStore>,
        model: Option<Arc<dyn GenerativeModel>>,
    ) -> Self {
        Self {
            search,
            ingestor,
            store,
            model,
            start_time: Instant::now(),
        }
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

// Parameter structs

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SearchBookmarksParams {
    /// Keywords or natural language query (required)
    pub query: String,
    /// Maximum number of results (default: 10, capped at 100)
    pub top_n: Option<u32>,
    /// Rerank with the generative model, dropping irrelevant hits (default: false)
    #[serde(default)]
    pub precision: bool,
    /// Comma-separated source types, e.g. "Blog,News" (optional)
    pub types: Option<String>,
    /// Comma-separated tags; a hit must carry at least one (optional)
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct AddBookmarksParams {
    /// URLs to bookmark (required, at least one)
    pub urls: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ListBookmarksParams {
    /// Filter by source type: Social, Media, Portal, Blog, News, Tool, Public, Etc (optional)
    pub source_type: Option<String>,
    /// Maximum results to return (optional, default: all)
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct UpdateBookmarkParams {
    /// Current link of the bookmark (required)
    pub original_link: String,
    /// Replacement link (required; pass the original to keep it)
    pub new_link: String,
    /// Replacement summary (required)
    pub new_summary: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct DeleteBookmarksParams {
    /// Exact links to delete (required, at least one)
    pub urls: Vec<String>,
}

// Helper: convert TagscopeError to CallToolResult with isError: true
fn error_to_result(err: TagscopeError) -> CallToolResult {
    match err {
        TagscopeError::NotFound { link } => {
            CallToolResult::structured_error(json!({
                "isError": true,
                "error": format!("Bookmark not found: {}", link),
                "hint": "Use list_bookmarks to find stored links"
            }))
        }
        TagscopeError::InvalidArgument { message, field } => {
            let mut obj = json!({
                "isError": true,
                "error": message,
            });
            if let Some(f) = field {
                obj["field"] = json!(f);
            }
            CallToolResult::structured_error(obj)
        }
        TagscopeError::DependencyUnavailable { dependency, message } => {
            CallToolResult::structured_error(json!({
                "isError": true,
                "error": format!("{} unavailable: {}", dependency, message),
                "dependency": dependency
            }))
        }
        other => {
            CallToolResult::structured_error(json!({
                "isError": true,
                "error": other.to_string()
            }))
        }
    }
}

fn bookmark_json(b: &Bookmark) -> serde_json::Value {
    json!({
        "link": b.link,
        "summary": b.summary,
        "base_url": b.base_url,
        "timestamp": b.timestamp,
        "tags": b.tags,
        "source_type": b.source_type,
        "image_url": b.image_url,
    })
}

// Tool implementations
#[rmcp::tool_router]
impl BookmarkService {
    #[tool(description = "Search bookmarks by keyword and meaning. Combines full-text rank with summary and tag vector similarity. Set precision: true to let a language model drop irrelevant hits and reorder the rest. Optional comma-separated filters: types (e.g. \"Blog,News\") and tags.")]
    async fn search_bookmarks(
        &self,
        Parameters(params): Parameters<SearchBookmarksParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "search_bookmarks", precision = params.precision, "Tool called");

        let type_filter = match parse_type_filter(params.types.as_deref()) {
            Ok(filter) => filter,
            Err(e) => return Ok(error_to_result(e)),
        };
        let request = SearchRequest {
            query: params.query,
            top_n: params.top_n.map(|n| n as usize),
            precision: params.precision,
            type_filter,
            tag_filter: parse_tag_filter(params.tags.as_deref()),
        };

        match self.search.search(&request).await {
            Ok(response) => match serde_json::to_value(&response) {
                Ok(value) => Ok(CallToolResult::structured(value)),
                Err(e) => Ok(error_to_result(TagscopeError::Internal(e.to_string()))),
            },
            Err(e) => Ok(error_to_result(e)),
        }
    }

    #[tool(description = "Add bookmarks. Each URL is fetched, summarised, tagged and classified by a language model, then embedded. URLs already stored are skipped. Processing stops at the first service failure.")]
    async fn add_bookmarks(
        &self,
        Parameters(params): Parameters<AddBookmarksParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "add_bookmarks", count = params.urls.len(), "Tool called");

        match self.ingestor.ingest_many(&params.urls).await {
            Ok(summary) => Ok(CallToolResult::structured(json!({
                "message": "Bookmarks added successfully.",
                "inserted": summary.inserted,
                "duplicates": summary.duplicates,
            }))),
            Err(e) => Ok(error_to_result(e)),
        }
    }

    #[tool(description = "List stored bookmarks, newest first. Optionally filter by source type and limit the count.")]
    async fn list_bookmarks(
        &self,
        Parameters(params): Parameters<ListBookmarksParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "list_bookmarks", "Tool called");

        let source_type = match params.source_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(name) => match name.parse::<SourceType>() {
                Ok(t) => Some(t),
                Err(e) => return Ok(error_to_result(TagscopeError::invalid("source_type", &e))),
            },
        };
        let filter = ListFilter {
            source_type,
            limit: params.limit.map(i64::from),
        };

        match self.ingestor.list(&filter).await {
            Ok(bookmarks) => {
                let items: Vec<serde_json::Value> = bookmarks.iter().map(bookmark_json).collect();
                Ok(CallToolResult::structured(json!({
                    "count": items.len(),
                    "bookmarks": items,
                })))
            }
            Err(e) => Ok(error_to_result(e)),
        }
    }

    #[tool(description = "Replace the link and summary of an existing bookmark. Embeddings are not recomputed.")]
    async fn update_bookmark(
        &self,
        Parameters(params): Parameters<UpdateBookmarkParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "update_bookmark", "Tool called");

        match self
            .ingestor
            .update(&params.original_link, &params.new_link, &params.new_summary)
            .await
        {
            Ok(()) => Ok(CallToolResult::structured(json!({
                "message": "Bookmark updated successfully.",
                "link": params.new_link.trim(),
            }))),
            Err(e) => Ok(error_to_result(e)),
        }
    }

    #[tool(description = "Delete bookmarks by exact link. This is permanent and cannot be undone.")]
    async fn delete_bookmarks(
        &self,
        Parameters(params): Parameters<DeleteBookmarksParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "delete_bookmarks", count = params.urls.len(), "Tool called");

        match self.ingestor.remove(&params.urls).await {
            Ok(removed) => Ok(CallToolResult::structured(json!({
                "message": "Bookmarks removed successfully.",
                "removed": removed,
            }))),
            Err(e) => Ok(error_to_result(e)),
        }
    }

    #[tool(description = "Send a short prompt to the configured language model and return its reply, to verify credentials and connectivity.")]
    async fn test_model(
        &self,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "test_model", "Tool called");

        let Some(model) = self.model.as_ref() else {
            return Ok(error_to_result(TagscopeError::model(
                "no generative model is configured",
            )));
        };

        match model.generate(MODEL_TEST_PROMPT).await {
            Ok(sample) => Ok(CallToolResult::structured(json!({
                "message": "Models test successful.",
                "model": model.model_name(),
                "sample": sample,
            }))),
            Err(e) => Ok(error_to_result(e.into())),
        }
    }

    #[tool(description = "Check server health and status")]
    async fn health_check(
        &self,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "health_check", "Tool called");

        let (status, bookmarks) = match self.store.count().await {
            Ok(count) => ("ok", Some(count)),
            Err(e) => {
                tracing::warn!(error = %e, "Store unreachable during health check");
                ("degraded", None)
            }
        };

        Ok(CallToolResult::structured(json!({
            "status": status,
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": self.uptime_seconds(),
            "bookmarks": bookmarks,
            "model_configured": self.model.is_some(),
        })))
    }
}

// Helper: render bookmarks as plain text for resource consumption
fn format_bookmarks_text(bookmarks: &[Bookmark]) -> String {
    bookmarks
        .iter()
        .map(|b| {
            format!(
                "---\n[{}] {}\n{}\nTags: {}\n---",
                b.source_type,
                b.summary.as_deref().unwrap_or("No summary"),
                b.link,
                b.tags.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ServerHandler implementation
#[rmcp::tool_handler(router = Self::tool_router())]
impl ServerHandler for BookmarkService {
    fn get_info(&self) -> rmcp::model::InitializeResult {
        rmcp::model::InitializeResult {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "tagscope".to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some("Bookmark manager with LLM enrichment and hybrid search".to_string()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Bookmark server. Tools: search_bookmarks, add_bookmarks, list_bookmarks, update_bookmark, delete_bookmarks, test_model, health_check. Resources: bookmarks://recent (latest bookmarks).".to_string()
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            meta: None,
            resources: vec![
                RawResource {
                    uri: "bookmarks://recent".to_string(),
                    name: "recent".to_string(),
                    title: Some("Recent Bookmarks".to_string()),
                    description: Some("The 20 most recently added bookmarks".to_string()),
                    mime_type: Some("text/plain".to_string()),
                    size: None,
                    icons: None,
                    meta: None,
                }
                .no_annotation(),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match request.uri.as_str() {
            "bookmarks://recent" => {
                let filter = ListFilter {
                    limit: Some(20),
                    ..Default::default()
                };
                let bookmarks = self
                    .store
                    .list(&filter)
                    .await
                    .map_err(|e| McpError::resource_not_found(e.to_string(), None))?;

                let text = if bookmarks.is_empty() {
                    "No bookmarks stored yet. Use add_bookmarks to add your first one.".to_string()
                } else {
                    format_bookmarks_text(&bookmarks)
                };

                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(text, request.uri)],
                })
            }
            uri => Err(McpError::resource_not_found(
                format!("Resource not found: {}", uri),
                None,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_error_payload() {
        let result = error_to_result(TagscopeError::NotFound {
            link: "https://gone".to_string(),
        });
        assert_eq!(result.is_error, Some(true));
        let body = result.structured_content.unwrap();
        assert_eq!(body["error"], "Bookmark not found: https://gone");
    }

    #[test]
    fn test_invalid_argument_carries_field() {
        let result = error_to_result(TagscopeError::invalid("top_n", "top_n must be at least 1"));
        let body = result.structured_content.unwrap();
        assert_eq!(body["field"], "top_n");
        assert_eq!(body["isError"], true);
    }

    #[test]
    fn test_dependency_is_named() {
        let result = error_to_result(TagscopeError::store("connection refused"));
        let body = result.structured_content.unwrap();
        assert_eq!(body["dependency"], "store");
    }

    #[test]
    fn test_format_bookmarks_text() {
        let b = Bookmark {
            link: "https://a.dev".to_string(),
            summary: None,
            embedding_summary: None,
            embedding_tags: None,
            base_url: Some("a.dev".to_string()),
            timestamp: None,
            tags: vec!["rust".to_string(), "web".to_string()],
            source_type: SourceType::Blog,
            image_url: None,
        };
        let text = format_bookmarks_text(&[b]);
        assert!(text.contains("[Blog] No summary"));
        assert!(text.contains("Tags: rust, web"));
    }
}
