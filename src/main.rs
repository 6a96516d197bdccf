use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tagscope::config::Config;
use tagscope::embedding::create_embedding_provider;
use tagscope::enrichment::{Enricher, HttpPageFetcher};
use tagscope::generation::{create_generative_model, GenerativeModel, ModelRole};
use tagscope::ingest::Ingestor;
use tagscope::logging;
use tagscope::search::{parse_tag_filter, parse_type_filter, HybridSearch, Reranker, SearchRequest};
use tagscope::server::BookmarkService;
use tagscope::store::postgres::PostgresBookmarkStore;
use tagscope::store::{BookmarkStore, ListFilter, SourceType};
use rmcp::ServiceExt;

#[derive(Parser)]
#[command(name = "tagscope", version, about = "Bookmark manager with LLM enrichment and hybrid search")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Skip automatic database migration on startup
    #[arg(long)]
    skip_migrate: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdio (the default)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Fetch, enrich, embed and store one or more URLs
    Add {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Hybrid search over stored bookmarks
    Search {
        query: String,
        /// Number of results
        #[arg(long)]
        top_n: Option<usize>,
        /// Rerank with the generative model
        #[arg(long)]
        precision: bool,
        /// Comma-separated source types, e.g. "Blog,News"
        #[arg(long)]
        types: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// List bookmarks, newest first
    List {
        #[arg(long)]
        source_type: Option<SourceType>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Replace the link and summary of a bookmark
    Update {
        original_link: String,
        #[arg(long)]
        new_link: String,
        #[arg(long)]
        new_summary: String,
    },
    /// Delete bookmarks by exact link
    Remove {
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

/// Generative model for `role`, or None (with a warning) when it cannot be built.
fn optional_model(config: &Config, role: ModelRole) -> Option<Arc<dyn GenerativeModel>> {
    match create_generative_model(&config.generation, role) {
        Ok(model) => {
            tracing::info!(
                provider = %config.generation.provider,
                model = %model.model_name(),
                role = ?role,
                "Generative model ready"
            );
            Some(model)
        }
        Err(e) => {
            tracing::warn!(error = %e, role = ?role, "Generative model unavailable");
            None
        }
    }
}

struct App {
    store: Arc<dyn BookmarkStore>,
    search: Arc<HybridSearch>,
    ingestor: Arc<Ingestor>,
    rerank_model: Option<Arc<dyn GenerativeModel>>,
}

async fn build_app(config: &Config, run_migrations: bool) -> Result<App> {
    let store: Arc<dyn BookmarkStore> = Arc::new(
        PostgresBookmarkStore::new(&config.database_url, run_migrations)
            .await
            .context("Failed to initialize database")?,
    );
    tracing::info!("PostgreSQL store initialized");

    let embedder = create_embedding_provider(&config.embedding)
        .context("Failed to initialize embedding provider")?;
    tracing::info!(
        provider = %config.embedding.provider,
        model = %embedder.model_name(),
        dimension = embedder.dimension(),
        "Embedding provider ready"
    );

    let enrichment_model = optional_model(config, ModelRole::Enrichment);
    let rerank_model = optional_model(config, ModelRole::Rerank);

    let enricher = match enrichment_model {
        Some(model) => {
            let fetcher = HttpPageFetcher::new(&config.enrichment)
                .context("Failed to build page fetcher")?;
            Some(Enricher::new(model, Arc::new(fetcher), &config.enrichment))
        }
        None => None,
    };

    let search = Arc::new(HybridSearch::new(
        embedder.clone(),
        store.clone(),
        rerank_model.clone().map(Reranker::new),
        config.search.clone(),
    ));
    let ingestor = Arc::new(Ingestor::new(enricher, embedder, store.clone()));

    Ok(App {
        store,
        search,
        ingestor,
        rerank_model,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Config error (using defaults): {}", e);
        Config::default()
    });

    // 3. Initialize logging FIRST; stdout is reserved for JSON-RPC
    logging::init_logging(&config);

    let run_migrations = !cli.skip_migrate;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Migrate => {
            tracing::info!("Running database migrations...");
            PostgresBookmarkStore::new(&config.database_url, true)
                .await
                .context("Failed to connect and run migrations")?;
            println!("Migrations completed successfully.");
        }

        Commands::Add { urls } => {
            let app = build_app(&config, run_migrations).await?;
            let summary = app.ingestor.ingest_many(&urls).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Search { query, top_n, precision, types, tags } => {
            let app = build_app(&config, run_migrations).await?;
            let request = SearchRequest {
                query,
                top_n,
                precision,
                type_filter: parse_type_filter(types.as_deref())?,
                tag_filter: parse_tag_filter(tags.as_deref()),
            };
            let response = app.search.search(&request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::List { source_type, limit } => {
            let app = build_app(&config, run_migrations).await?;
            let bookmarks = app.ingestor.list(&ListFilter { source_type, limit }).await?;
            for b in &bookmarks {
                println!(
                    "{}\t{}\t{}",
                    b.source_type,
                    b.link,
                    b.summary.as_deref().unwrap_or("")
                );
            }
            println!("{} bookmark(s)", bookmarks.len());
        }

        Commands::Update { original_link, new_link, new_summary } => {
            let app = build_app(&config, run_migrations).await?;
            app.ingestor.update(&original_link, &new_link, &new_summary).await?;
            println!("Bookmark updated.");
        }

        Commands::Remove { urls } => {
            let app = build_app(&config, run_migrations).await?;
            let removed = app.ingestor.remove(&urls).await?;
            println!("Removed {} bookmark(s).", removed);
        }

        Commands::Serve => {
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "tagscope server starting");

            let app = build_app(&config, run_migrations).await?;
            let service = BookmarkService::new(app.search, app.ingestor, app.store, app.rerank_model);

            let (stdin, stdout) = rmcp::transport::io::stdio();
            let server = service.serve((stdin, stdout)).await?;

            tracing::info!("tagscope server running, awaiting tool calls via stdio");

            server.waiting().await?;

            tracing::info!("tagscope server stopped");
        }
    }

    Ok(())
}
