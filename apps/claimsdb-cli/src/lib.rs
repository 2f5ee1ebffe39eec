//! Shared wiring for the command-line tools.
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use claimsdb_core::config::{resolve_with_base, Config, Settings};
use claimsdb_core::traits::{ClaimStore, Embedder};
use claimsdb_embed::get_default_embedder;
use claimsdb_store::PgClaimStore;

/// Log to stderr so stdout only carries the answer. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Load settings from `config_dir`; a relative model directory is taken relative to it.
pub fn load_settings(config_dir: &Path) -> Result<Settings> {
    let config = Config::load_in(config_dir).map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let mut settings = config.settings()?;
    settings.embedding.model_dir = resolve_with_base(config_dir, &settings.embedding.model_dir).to_string_lossy().to_string();
    tracing::debug!(env = config.env_name(), ?settings, "configuration loaded");
    Ok(settings)
}

pub async fn connect_store(settings: &Settings) -> Result<Arc<dyn ClaimStore>> {
    Ok(Arc::new(PgClaimStore::connect(&settings.store.url).await?))
}

/// Model loading is CPU and disk bound, so it runs off the async runtime.
pub async fn load_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let embedding = settings.embedding.clone();
    let embedder = tokio::task::spawn_blocking(move || get_default_embedder(&embedding)).await.context("embedder loader panicked")??;
    Ok(Arc::from(embedder))
}
