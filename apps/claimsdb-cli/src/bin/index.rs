use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use claimsdb_cli::{connect_store, init_tracing, load_embedder, load_settings};
use claimsdb_core::traits::ClaimStore;
use claimsdb_index::{IndexManager, SemanticRetriever};

/// Build the semantic index over the claims table and optionally run a test query against it.
#[derive(Debug, Parser)]
#[command(name = "claimsdb-index", version)]
struct Cli {
    /// Run a debug search against the freshly built index.
    #[arg(long)]
    query: Option<String>,
    /// Number of neighbours to print (defaults to retrieval.top_k).
    #[arg(long, short)]
    k: Option<usize>,
    /// Directory holding config.toml and config.<env>.toml.
    #[arg(long, env = "APP_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = load_settings(&cli.config_dir)?;
    println!("Claims Semantic Indexer\n=======================");
    println!("Store: {}", settings.store.url.rsplit('@').next().unwrap_or_default());

    let store = connect_store(&settings).await?;
    println!("📊 {} claims in store (indexing up to {})", store.count_claims().await?, settings.retrieval.index_sample_limit);
    let embedder = load_embedder(&settings).await?;
    let manager = Arc::new(IndexManager::new(store, embedder, &settings.retrieval).with_progress(true));
    if manager.rebuild().await.is_none() { bail!("index build failed; see log output"); }

    let status = manager.status().await;
    println!("\n✅ Index ready: {} documents, dim={}, embedder={}", status.documents, status.dim, status.embedder_id.unwrap_or_default());
    if let Some(built_at) = status.built_at { println!("🕒 Built at {}", built_at.to_rfc3339()); }

    if let Some(query) = cli.query {
        let k = cli.k.unwrap_or(settings.retrieval.top_k).max(1);
        let result = SemanticRetriever::new(Arc::clone(&manager), settings.retrieval.distance_threshold).search(&query, k).await;
        println!("\n🔍 Found {} results for: \"{}\"{}", result.results.len(), query, if result.fallback_needed { " (no confident match; RUST_LOG=debug lists rejected hits)" } else { "" });
        for (i, hit) in result.results.iter().enumerate() {
            println!("  {}. distance={:.4}  {}", i + 1, hit.distance, hit.document);
        }
    }
    Ok(())
}
