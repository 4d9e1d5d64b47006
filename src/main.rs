use clap::{ArgAction, Parser, Subcommand};
use futures::future::try_join_all;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use twin_cache::{CacheHandle, Database, DigestCache, MemoryDigestCache, SqliteDigestCache};
use twin_catalog::{HttpCatalog, Lookup, RemoteCatalog};
use twin_config::Config;
use twin_hash::{ChunkedHasher, Digest, LocalSource};
use twin_transfer::{FileId, MemoryRegistry, NullSink, Orchestrator, TransferFile, TransferResult};

#[derive(Parser)]
#[command(name = "twin")]
#[command(about = "Skip uploads the remote store already has")]
#[command(version)]
struct Cli {
    /// Config file (TOML, YAML or JSON)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,
    /// Keep digests in memory for this run only
    #[arg(long, global = true)]
    no_cache: bool,
    /// More logging; repeat for trace output
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the content digest of each file
    Hash {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Ask the store whether it holds content with this digest
    Lookup { digest: String },
    /// Report which files the store already has, and which would be uploaded
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn report<E>(err: exn::Exn<E>) -> miette::Report
where
    E: std::error::Error + Send + Sync + 'static,
{
    miette::miette!("{err:?}")
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { config, no_cache, verbose, command } = Cli::parse();
    init_tracing(verbose);
    let config = Config::load(config.as_deref()).map_err(report)?;

    match command {
        Command::Hash { files } => hash(&config, no_cache, &files).await,
        Command::Lookup { digest } => lookup(&config, &digest).await,
        Command::Check { files } => check(&config, no_cache, &files).await,
    }
}

async fn open_cache(config: &Config, no_cache: bool) -> Result<(CacheHandle, Option<Database>)> {
    if no_cache {
        return Ok((Arc::new(MemoryDigestCache::default()), None));
    }
    let Some(path) = config.cache_path() else {
        tracing::warn!("no cache directory available, digests will not be remembered");
        return Ok((Arc::new(MemoryDigestCache::default()), None));
    };
    tracing::debug!(path = %path.display(), "opening digest cache");
    let db = Database::connect(&path).await.map_err(report)?;
    Ok((Arc::new(SqliteDigestCache::from(&db)), Some(db)))
}

fn catalog(config: &Config) -> Result<HttpCatalog> {
    let gateway = config.require_gateway().map_err(report)?;
    HttpCatalog::new(gateway, config.catalog_options()).map_err(report)
}

/// Files are keyed by canonical path so the cache recognises them across runs.
async fn canonical(path: &Path) -> Result<PathBuf> {
    tokio::fs::canonicalize(path).await.into_diagnostic().wrap_err_with(|| format!("cannot open {}", path.display()))
}

async fn hash(config: &Config, no_cache: bool, files: &[PathBuf]) -> Result<()> {
    let (cache, db) = open_cache(config, no_cache).await?;
    let hasher = ChunkedHasher::new(config.chunk_size).map_err(report)?;
    for path in files {
        let path = canonical(path).await?;
        let key = path.display().to_string();
        let digest = match cache.get(&key).await.map_err(report)? {
            Some(digest) => digest,
            None => {
                let source = LocalSource::open(&path).await.map_err(report)?;
                let digest: Digest = hasher.digest(&source).await.map_err(report)?;
                cache.set(&key, &digest).await.map_err(report)?;
                digest
            },
        };
        println!("{digest}  {}", path.display());
    }
    if let Some(db) = db {
        db.close().await;
    }
    Ok(())
}

async fn lookup(config: &Config, digest: &str) -> Result<()> {
    let digest = Digest::parse(digest).map_err(report)?;
    match catalog(config)?.lookup(digest.as_str()).await.map_err(report)? {
        Lookup::Found(record) => println!("{}", serde_json::to_string_pretty(&record).into_diagnostic()?),
        Lookup::NotFound { status, message } => match message {
            Some(message) => println!("not found ({status}: {message})"),
            None => println!("not found ({status})"),
        },
    }
    Ok(())
}

async fn check(config: &Config, no_cache: bool, files: &[PathBuf]) -> Result<()> {
    let catalog = catalog(config)?;
    let (cache, db) = open_cache(config, no_cache).await?;
    let hasher = ChunkedHasher::new(config.chunk_size).map_err(report)?;

    let paths = try_join_all(files.iter().map(|path| canonical(path))).await?;
    let mut transfer_files = Vec::with_capacity(paths.len());
    for path in &paths {
        transfer_files.push(TransferFile::from_path(path).await.map_err(report)?);
    }
    let ids: Vec<FileId> = transfer_files.iter().map(|f| f.id.clone()).collect();
    let registry = Arc::new(MemoryRegistry::with_files(transfer_files));

    let results = Arc::new(Mutex::new(Vec::new()));
    let collected = Arc::clone(&results);
    let orchestrator = Orchestrator::new(registry.clone(), Arc::new(NullSink), cache, Arc::new(catalog))
        .with_hasher(hasher)
        .with_result_callback(Arc::new(move |result: &TransferResult| {
            if let Ok(mut results) = collected.lock() {
                results.push(result.clone());
            }
        }));

    let decisions = orchestrator.prepare(&ids).await;
    for (id, decision) in &decisions {
        println!("{:<9} {id}", decision.to_string());
    }
    let results = results.lock().map(|r| r.clone()).unwrap_or_default();
    if !results.is_empty() {
        println!("\nalready stored:");
        for result in &results {
            println!("  {}  {}", result.id, result.url.as_deref().unwrap_or("-"));
        }
    }
    let queue = registry.transfer_queue().await;
    println!("\n{} of {} file(s) would be uploaded", queue.len(), decisions.len());
    for id in &queue {
        println!("  {id}");
    }

    if let Some(db) = db {
        db.close().await;
    }
    Ok(())
}
