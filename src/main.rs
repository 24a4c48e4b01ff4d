//! # docdex CLI
//!
//! ```bash
//! docdex --config ./docdex.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docdex init` | Create the SQLite database and schema |
//! | `docdex sync` | Reconcile the document directory with the index |
//! | `docdex search "<query>"` | Return the most relevant chunks |
//! | `docdex stats` | Show document and chunk counts |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use docdex::config::{self, Config};
use docdex::db;
use docdex::embedding;
use docdex::ingest::Ingestor;
use docdex::migrate;
use docdex::search::SemanticSearch;
use docdex::source::FilesystemSource;
use docdex::store::sqlite::SqliteStore;
use docdex::store::Store;

/// docdex — a document ingestion and semantic retrieval engine for chat
/// assistants.
#[derive(Parser)]
#[command(
    name = "docdex",
    about = "Keep a chunk-level vector index in sync with a document directory and search it",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./docdex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Run one ingestion pass: diff the source directory against the
    /// index and apply inserts, updates, and deletions.
    Sync {
        /// Re-chunk and re-embed every document, ignoring fingerprints.
        #[arg(long)]
        full: bool,

        /// Print the plan without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search indexed chunks by semantic similarity.
    Search {
        /// The query text.
        query: String,

        /// Maximum number of results (defaults to retrieval.top_k).
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show index statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docdex=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&config).await,
        Commands::Sync { full, dry_run } => run_sync(&config, full, dry_run).await,
        Commands::Search { query, limit } => run_search(&config, &query, limit).await,
        Commands::Stats => run_stats(&config).await,
    }
}

async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("initialized {}", config.db.path.display());
    Ok(())
}

async fn run_sync(config: &Config, full: bool, dry_run: bool) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;

    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    let provider = embedding::create_provider(&config.embedding)?;
    let source = Arc::new(FilesystemSource::new(&config.source)?);

    let ingestor = Ingestor::new(
        Arc::clone(&store),
        provider,
        config.chunking.clone(),
        &config.embedding,
    );

    if dry_run {
        let plan = ingestor.plan(source.as_ref(), full).await?;
        println!("sync (dry-run)");
        println!("  add: {}", plan.add.len());
        println!("  update: {}", plan.update.len());
        println!("  remove: {}", plan.remove.len());
        println!("  unchanged: {}", plan.unchanged);
        return Ok(());
    }

    let report = ingestor.run(source, full).await?;
    println!("sync");
    println!("  added: {}", report.added);
    println!("  updated: {}", report.updated);
    println!("  removed: {}", report.removed);
    println!("  unchanged: {}", report.unchanged);
    println!("  failed: {}", report.failed);
    println!("  chunks written: {}", report.chunks_written);
    for failure in &report.failures {
        println!("  failed {}: {}", failure.key, failure.error);
    }
    println!("ok");
    Ok(())
}

async fn run_search(config: &Config, query: &str, limit: Option<i64>) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    let provider = embedding::create_provider(&config.embedding)?;

    let service = SemanticSearch::new(store, provider);
    let k = limit.unwrap_or(config.retrieval.top_k);
    let hits = service.search(query, k).await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, hit.score, hit.citation());
        println!(
            "    \"{}\"",
            hit.text.replace('\n', " ").chars().take(240).collect::<String>()
        );
    }
    Ok(())
}

async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    let store = SqliteStore::new(pool);
    println!("documents: {}", store.document_count().await?);
    println!("chunks: {}", store.chunk_count().await?);
    Ok(())
}
