//! cache_tool: maintenance CLI for the listing cache
//!
//! Inspects and invalidates keys on the configured backend, and replays
//! read-model syncs from a JSON file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use listing_cache::cache::{CacheKeys, CacheMetrics};
use listing_cache::error::Result;
use listing_cache::models::SyncRequest;
use listing_cache::readmodel::{
    CacheInvalidator, DocumentSink, PropertyDocument, PublicUrlResolver, ReadModelSynchronizer,
};
use listing_cache::bootstrap::Documents;
use listing_cache::{Backends, Config};

#[derive(Parser, Debug)]
#[command(name = "cache_tool", version, about = "Listing cache maintenance", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List keys matching a `*` glob (blocks Redis; maintenance only)
    Keys { pattern: String },
    /// Delete every key matching a `*` glob
    Invalidate { pattern: String },
    /// Rebuild read-model documents from a JSON file of sync requests.
    /// Writes to the document store when DOCUMENT_STORE_URL is set, otherwise
    /// prints documents as JSON lines
    Sync {
        #[arg(long)]
        file: PathBuf,
        /// Log invalidations instead of touching the cache
        #[arg(long)]
        dry_run: bool,
    },
}

/// One request or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum SyncBatch {
    Many(Vec<SyncRequest>),
    One(SyncRequest),
}

impl SyncBatch {
    fn into_vec(self) -> Vec<SyncRequest> {
        match self {
            SyncBatch::Many(requests) => requests,
            SyncBatch::One(request) => vec![request],
        }
    }
}

// == Sinks ==
/// Prints each document as one JSON line; used when no document store is
/// configured so the output can be loaded elsewhere.
struct StdoutSink;

#[async_trait]
impl DocumentSink for StdoutSink {
    async fn upsert_property_document(&self, _property_id: &str, doc: &PropertyDocument) -> Result<()> {
        println!("{}", serde_json::to_string(doc)?);
        Ok(())
    }
}

/// Logs documents and invalidations without writing anything.
struct DryRun;

#[async_trait]
impl DocumentSink for DryRun {
    async fn upsert_property_document(&self, property_id: &str, doc: &PropertyDocument) -> Result<()> {
        info!(property_id = property_id, images = doc.images.len(), "[dry-run] would upsert document");
        Ok(())
    }
}

#[async_trait]
impl CacheInvalidator for DryRun {
    async fn delete_key(&self, key: &str) -> Result<()> {
        info!(key = key, "[dry-run] would delete key");
        Ok(())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<()> {
        info!(pattern = pattern, "[dry-run] would invalidate pattern");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listing_cache=info,cache_tool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;

    match cli.command {
        Commands::Keys { pattern } => {
            let backends = Backends::connect(&config).await;
            for key in backends.kv.keys(&pattern).await? {
                println!("{}", key);
            }
        }
        Commands::Invalidate { pattern } => {
            let backends = Backends::connect(&config).await;
            let cache = backends.cache(Arc::new(CacheMetrics::new()));
            let removed = cache.invalidate_pattern(&pattern).await;
            info!(pattern = %pattern, removed = removed, "Invalidated");
        }
        Commands::Sync { file, dry_run } => sync(&config, &file, dry_run).await?,
    }

    Ok(())
}

async fn sync(config: &Config, file: &Path, dry_run: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let batch: SyncBatch = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a sync request or a list of them", file.display()))?;
    let resolver = Arc::new(
        PublicUrlResolver::new(config.storage_public_url.as_deref())
            .context("invalid STORAGE_PUBLIC_URL")?,
    );

    let synchronizer = if dry_run {
        let dry = Arc::new(DryRun);
        ReadModelSynchronizer::new(resolver, dry.clone(), dry, CacheKeys::new(), config.default_currency.clone())
    } else {
        let sink: Arc<dyn DocumentSink> = if config.document_store_url.is_some() {
            Documents::connect(config)
                .await
                .context("document store unavailable")?
                .sink
        } else {
            Arc::new(StdoutSink)
        };
        let backends = Backends::connect(config).await;
        let cache = Arc::new(backends.cache(Arc::new(CacheMetrics::new())));
        ReadModelSynchronizer::new(
            resolver,
            sink,
            cache,
            CacheKeys::new(),
            config.default_currency.clone(),
        )
    };

    let requests = batch.into_vec();
    let total = requests.len();
    for request in requests {
        if let Some(error_msg) = request.validate() {
            anyhow::bail!("invalid sync request: {}", error_msg);
        }
        synchronizer
            .build_and_upsert(&request.property, &request.images, &request.features)
            .await
            .with_context(|| format!("sync failed for property {}", request.property.id))?;
    }

    info!(properties = total, dry_run = dry_run, "Sync complete");
    Ok(())
}
