use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use semdex::config::Config;
use semdex::crawler::{Crawler, Poller};
use semdex::embedder::MockEmbedder;
use semdex::ignore::IgnoreRuleSet;
use semdex::indexer::Indexer;
use semdex::loader::LoaderRegistry;
use semdex::queue::work_queue;
use semdex::search::RetrievalRanker;
use semdex::store::memory::MemoryStore;

#[derive(Parser)]
#[command(name = "semdex", version, about = "Incremental semantic document indexer")]
struct Cli {
    /// Path to the JSON config file.
    #[arg(short, long, default_value = "")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the document root once, index everything, then exit.
    Index,
    /// Keep polling the document root and indexing changes until
    /// interrupted.
    Watch,
    /// Run a semantic search against the indexed documents.
    Search {
        query: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    // 1. Load and validate config
    let config = Arc::new(Config::load(&cli.config)?);
    config.validate().context("invalid configuration")?;

    // 2. Shared collaborators. The in-memory store and mock embedder
    //    keep the binary self-contained; real deployments swap these
    //    at the trait seams.
    let root = PathBuf::from(&config.root_path);
    let rules = Arc::new(IgnoreRuleSet::load(&root));
    let embedder = Arc::new(MockEmbedder::new(config.model.dimensions));
    let store = Arc::new(MemoryStore::new());

    match cli.command {
        Command::Index => {
            let indexer = Arc::new(Indexer::new(
                &config,
                rules.clone(),
                LoaderRegistry::with_defaults(),
                embedder,
                store,
            )?);

            let (tx, rx) = work_queue();
            let crawler = Crawler::new(root, rules, &config.allowed_extensions);
            let producer = tokio::task::spawn_blocking(move || crawler.run_once(&tx));

            let summary = indexer.run(rx, CancellationToken::new()).await;
            producer.await?.context("crawl failed")?;
            info!(
                indexed = summary.indexed,
                skipped = summary.skipped,
                failed = summary.failed,
                purged = summary.purged,
                "one-shot index complete"
            );
        }
        Command::Watch => {
            let indexer = Arc::new(Indexer::new(
                &config,
                rules.clone(),
                LoaderRegistry::with_defaults(),
                embedder,
                store,
            )?);

            let (tx, rx) = work_queue();
            let crawler = Crawler::new(root, rules, &config.allowed_extensions);
            let poller = Poller::new(
                crawler,
                Duration::from_secs(config.indexer.poll_interval_secs),
            );

            let cancel = CancellationToken::new();
            let poller_cancel = cancel.clone();
            let producer = tokio::spawn(poller.run(tx, poller_cancel));
            let consumer = tokio::spawn(indexer.run(rx, CancellationToken::new()));

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for shutdown signal")?;
            info!("shutting down");
            cancel.cancel();

            producer.await?.context("poller failed")?;
            consumer.await?;
        }
        Command::Search { query, limit } => {
            // the in-memory store starts empty, so populate it with a
            // one-shot index pass before querying
            let indexer = Arc::new(Indexer::new(
                &config,
                rules.clone(),
                LoaderRegistry::with_defaults(),
                embedder.clone(),
                store.clone(),
            )?);
            let (tx, rx) = work_queue();
            let crawler = Crawler::new(root, rules, &config.allowed_extensions);
            let producer = tokio::task::spawn_blocking(move || crawler.run_once(&tx));
            indexer.run(rx, CancellationToken::new()).await;
            producer.await?.context("crawl failed")?;

            let ranker = RetrievalRanker::new(
                embedder,
                store,
                None,
                config.search.clone(),
                config.root_path.clone(),
                config.display_path.clone(),
            );
            let limit = limit.unwrap_or(config.search.limit);
            let results = ranker.search_with_limit(&query, limit)?;

            if results.is_empty() {
                println!("no results");
                return Ok(());
            }
            for (i, result) in results.iter().enumerate() {
                println!(
                    "{:2}. [{:6.2}] {} ({})",
                    i + 1,
                    result.relevance,
                    result.file_name,
                    result.url
                );
                let preview: String = result.content.chars().take(160).collect();
                println!("     {preview}");
            }
        }
    }

    Ok(())
}
