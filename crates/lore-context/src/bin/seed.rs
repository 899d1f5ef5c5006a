//! Offline builder for seed snapshots shipped with the retrieval store.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        reason = "Test allows"
    )
)]

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use lore_context::{DocumentSource, RetrievalService, inspect_snapshot};
use lore_core::{Error, RetrievalConfig};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};
use walkdir::{DirEntry, WalkDir};

/// Number of documents previewed by `list`
const PREVIEW_COUNT: usize = 3;
/// Characters shown per preview
const PREVIEW_CHARS: usize = 120;

#[derive(Parser)]
#[command(name = "lore-seed")]
#[command(about = "Build, inspect, search and clear seed vector snapshots")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Snapshot file to operate on (defaults to the configured seed path)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Embedding model to use
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Ollama base URL
    #[arg(long, global = true)]
    ollama: Option<String>,

    /// Embedding dimension of the chosen model
    #[arg(long, global = true)]
    dimension: Option<usize>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed and append `.txt` and `.json` files (directories are walked)
    Ingest {
        /// Files or directories to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Show the document count and a few previews
    List,
    /// Print the chunks most relevant to a question
    Query {
        /// Question to embed
        text: String,
        /// Number of hits (defaults to `query.default_top_k`)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Delete the snapshot
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "lore=info".into()))
        .with(fmt::layer().with_target(false))
        .init();

    let args = Args::parse();
    let config = resolve_config(&args)?;
    let output = config.storage.store_path();

    match args.command {
        Command::Ingest { paths } => ingest(config, &paths).await,
        Command::List => list(&output),
        Command::Query { text, top_k } => query(config, &text, top_k).await,
        Command::Clear => clear(&output),
    }
}

/// Merge file config, environment and flags, pointing the store at the seed snapshot
fn resolve_config(args: &Args) -> Result<RetrievalConfig> {
    let mut config = match &args.config {
        Some(path) => RetrievalConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
            .with_env_overrides(),
        None => RetrievalConfig::from_env(),
    };

    if let Some(model) = &args.model {
        config.embedding.model.clone_from(model);
    }
    if let Some(url) = &args.ollama {
        config.embedding.base_url.clone_from(url);
    }
    if let Some(dimension) = args.dimension {
        config.embedding.dimension = dimension;
    }

    let output = args
        .output
        .clone()
        .or_else(|| config.storage.seed_path.clone())
        .context("No output path given and no seed path configured")?;
    let file_name = output
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Output path {} has no file name", output.display()))?
        .to_owned();

    config.storage.data_directory = output
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    config.storage.store_file = file_name;
    config.storage.seed_path = None;
    config.validate()?;
    Ok(config)
}

async fn ingest(config: RetrievalConfig, targets: &[PathBuf]) -> Result<()> {
    let files = expand_paths(targets);
    if files.is_empty() {
        bail!("No ingestable .txt or .json files found");
    }

    let service = RetrievalService::new(config)?;
    if !service.is_healthy().await {
        bail!(
            "Ollama is not reachable at {}",
            service.config().embedding.base_url
        );
    }

    match service.load_all().await {
        Ok(_) => {}
        Err(error @ Error::CorruptedStore(_)) => {
            return Err(error).context(
                "Existing snapshot is damaged; run `list` to inspect it or `clear` to start over",
            );
        }
        Err(error) => return Err(error.into()),
    }

    let mut added = 0;
    for file in files {
        match service.store_document(DocumentSource::Path(file.clone())).await {
            Ok(chunks) => {
                info!("Ingested {} -> {chunks} chunks", file.display());
                added += chunks;
            }
            Err(error) => warn!("Skipping {}: {error}", file.display()),
        }
    }

    service.persist_all().await?;
    info!(
        "Ingest complete. Added {added} chunks. Store size={}",
        service.count(None).await
    );
    Ok(())
}

/// Files under `targets` with a `.txt` or `.json` extension, sorted and deduplicated
fn expand_paths(targets: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = targets
        .iter()
        .flat_map(|target| {
            WalkDir::new(target)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(error) => {
                        warn!("Cannot read {}: {error}", target.display());
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(DirEntry::into_path)
        })
        .filter(|path| is_ingestable(path))
        .collect();

    files.sort();
    files.dedup();
    files
}

fn is_ingestable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("json"))
}

fn list(output: &Path) -> Result<()> {
    let inspection = match inspect_snapshot(output) {
        Ok(inspection) => inspection,
        Err(Error::Io(error)) if error.kind() == ErrorKind::NotFound => {
            info!("Store is empty: {} does not exist", output.display());
            return Ok(());
        }
        Err(error) => return Err(error.into()),
    };

    info!("Store: {}", output.display());
    info!("Documents: {}", inspection.documents.len());
    if let Some(reason) = &inspection.truncation {
        warn!(
            "Snapshot is truncated ({} of {} declared documents readable): {reason}",
            inspection.documents.len(),
            inspection.declared
        );
    }

    for document in inspection.documents.iter().take(PREVIEW_COUNT) {
        info!(
            "  [{}] chunk {}/{}: {}",
            document.id,
            document.metadata.chunk_index + 1,
            document.metadata.chunk_total,
            preview(&document.content)
        );
    }
    Ok(())
}

async fn query(config: RetrievalConfig, text: &str, top_k: Option<usize>) -> Result<()> {
    let top_k = top_k.unwrap_or(config.query.default_top_k);
    let output = config.storage.store_path();
    let service = RetrievalService::new(config)?;

    if service.load_all().await? == 0 {
        info!("Store is empty: nothing to search in {}", output.display());
        return Ok(());
    }

    let hits = service.query(text, None, top_k).await?;
    info!("{} of top {top_k} hits for \"{text}\"", hits.len());
    for hit in hits {
        info!("  {:.3} [{}] {}", hit.score, hit.document.id, preview(&hit.document.content));
    }
    Ok(())
}

/// First characters of `content` on a single line
fn preview(content: &str) -> String {
    content
        .chars()
        .take(PREVIEW_CHARS)
        .map(|character| if character == '\n' { ' ' } else { character })
        .collect()
}

fn clear(output: &Path) -> Result<()> {
    match fs::remove_file(output) {
        Ok(()) => info!("Cleared store: {}", output.display()),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            info!("Nothing to clear at {}", output.display());
        }
        Err(error) => {
            return Err(error).with_context(|| format!("Failed to remove {}", output.display()));
        }
    }
    Ok(())
}
