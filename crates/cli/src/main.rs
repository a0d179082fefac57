//! transcache entry point.
//!
//! Lifecycle: load configuration, load the registry (running schema
//! migration when the on-disk shape is obsolete), sweep orphaned entries,
//! then drive the acquisition pipeline over the batch and print a
//! summary. Logging goes to stderr so stdout stays scriptable.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use transcache_client::{ClientConfig, TranscriptClient};
use transcache_core::{sweep, AppConfig, RegistryStore};

mod args;
mod links;
mod pipeline;
mod stats;

use args::Args;
use links::FsLinkStore;
use pipeline::Pipeline;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load().context("failed to load configuration")?;

    let link_store = FsLinkStore::new(config.links_dir.clone(), config.artifacts_dir.clone());
    let mut store = RegistryStore::new(
        config.registry_path.clone(),
        config.artifacts_dir.clone(),
        config.cache_capacity,
    );

    // Load runs migration when the on-disk shape is obsolete.
    let mut registry = store.load().await.context("failed to load registry")?;
    tracing::debug!(entries = registry.len(), "registry loaded");

    if args.stats {
        let rows = store
            .load_metadata_projection(&link_store)
            .await
            .context("failed to build statistics")?;
        print!("{}", stats::render(&rows));
        return Ok(());
    }

    // Pre-batch integrity sweep.
    let report = sweep::validate_integrity(&mut store, &mut registry, &link_store)
        .await
        .context("integrity sweep failed")?;
    if report.orphaned > 0 || !report.errors.is_empty() {
        println!(
            "Integrity sweep: {} checked, {} orphaned, {} errors",
            report.checked,
            report.orphaned,
            report.errors.len()
        );
        for error in &report.errors {
            eprintln!("  {error}");
        }
    }
    if args.sweep {
        return Ok(());
    }

    let ids = args.collect_ids().context("failed to read identifier list")?;
    if ids.is_empty() {
        println!("Nothing to do (no identifiers given).");
        return Ok(());
    }

    let api_key = config.require_api_key().context("credential required for fetching")?;
    let client = TranscriptClient::new(ClientConfig::from_app(&config, api_key.to_string()))
        .map_err(transcache_core::Error::from)
        .context("failed to build fetch client")?;

    let mut pipeline = Pipeline::new(&mut store, registry, &client, &link_store);
    let summary = pipeline.process_batch(&ids).await;

    println!(
        "Done: {} total, {} fetched, {} cache hits, {} failed{}",
        summary.total,
        summary.fetched,
        summary.cache_hits,
        summary.failed,
        if summary.aborted { " (aborted)" } else { "" }
    );

    if summary.aborted {
        std::process::exit(2);
    }
    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
