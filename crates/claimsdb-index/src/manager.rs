//! Owns the semantic index: built lazily on first use, replaced wholesale on rebuild.
//!
//! Builds are serialized by `build_lock`. Callers that queued behind a build
//! observe its outcome (the new snapshot, or `None` if it failed) instead of
//! starting another build. A failed build or rebuild leaves the index unset.
use anyhow::{anyhow, ensure};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use claimsdb_core::config::RetrievalSettings;
use claimsdb_core::error::{Error, Result};
use claimsdb_core::traits::{ClaimStore, Embedder};
use claimsdb_core::types::Document;

use crate::cache::{hash_content, CacheEntry, EmbeddingCache};
use crate::snapshot::IndexSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Unbuilt,
    Building,
    Ready,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexStatus {
    pub state: IndexState,
    pub documents: usize,
    pub dim: usize,
    pub embedder_id: Option<String>,
    pub built_at: Option<DateTime<Utc>>,
    /// Completed build attempts, successful or not.
    pub build_attempts: u64,
}

pub struct IndexManager {
    store: Arc<dyn ClaimStore>,
    embedder: Arc<dyn Embedder>,
    cache: Arc<EmbeddingCache>,
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
    build_lock: Mutex<()>,
    attempts: AtomicU64,
    building: AtomicBool,
    sample_limit: usize,
    batch_size: usize,
    show_progress: bool,
}

impl IndexManager {
    pub fn new(store: Arc<dyn ClaimStore>, embedder: Arc<dyn Embedder>, settings: &RetrievalSettings) -> Self {
        Self {
            store,
            embedder,
            cache: Arc::new(EmbeddingCache::new()),
            snapshot: RwLock::new(None),
            build_lock: Mutex::new(()),
            attempts: AtomicU64::new(0),
            building: AtomicBool::new(false),
            sample_limit: settings.index_sample_limit.max(1),
            batch_size: settings.embed_batch_size.max(1),
            show_progress: false,
        }
    }

    /// Draw an indicatif bar on stderr while encoding (CLI use).
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> { Arc::clone(&self.embedder) }

    pub fn cache(&self) -> &EmbeddingCache { &self.cache }

    /// Current snapshot without triggering a build.
    pub async fn snapshot(&self) -> Option<Arc<IndexSnapshot>> { self.snapshot.read().await.clone() }

    pub async fn is_ready(&self) -> bool { self.snapshot.read().await.is_some() }

    /// Build once if no index exists. Returns the live snapshot, or `None` if the build failed.
    pub async fn ensure_built(&self) -> Option<Arc<IndexSnapshot>> {
        if let Some(snapshot) = self.snapshot().await { return Some(snapshot); }
        let seen = self.attempts.load(Ordering::SeqCst);
        let _guard = self.build_lock.lock().await;
        if let Some(snapshot) = self.snapshot().await { return Some(snapshot); }
        if self.attempts.load(Ordering::SeqCst) != seen {
            tracing::debug!("index build finished while waiting; not retrying");
            return None;
        }
        self.build_locked().await
    }

    /// Unconditionally rebuild from the store and replace the snapshot.
    pub async fn rebuild(&self) -> Option<Arc<IndexSnapshot>> {
        let _guard = self.build_lock.lock().await;
        self.build_locked().await
    }

    pub async fn status(&self) -> IndexStatus {
        let snapshot = self.snapshot().await;
        let state = if self.building.load(Ordering::SeqCst) {
            IndexState::Building
        } else if snapshot.is_some() {
            IndexState::Ready
        } else {
            IndexState::Unbuilt
        };
        IndexStatus {
            state,
            documents: snapshot.as_ref().map_or(0, |s| s.len()),
            dim: snapshot.as_ref().map_or(0, |s| s.dim()),
            embedder_id: snapshot.as_ref().map(|s| s.embedder_id().to_string()),
            built_at: snapshot.as_ref().map(|s| s.built_at()),
            build_attempts: self.attempts.load(Ordering::SeqCst),
        }
    }

    async fn build_locked(&self) -> Option<Arc<IndexSnapshot>> {
        let _building = BuildingFlag::raise(&self.building);
        let installed = match self.build().await {
            Ok(Some(snapshot)) => {
                tracing::info!(documents = snapshot.len(), dim = snapshot.dim(), embedder = snapshot.embedder_id(), "✅ Semantic index ready");
                Some(Arc::new(snapshot))
            }
            Ok(None) => {
                tracing::warn!("⚠️  No valid claims to index; semantic search unavailable");
                None
            }
            Err(err) => {
                tracing::error!(error = %err, "❌ Failed to build semantic index");
                None
            }
        };
        *self.snapshot.write().await = installed.clone();
        self.attempts.fetch_add(1, Ordering::SeqCst);
        installed
    }

    async fn build(&self) -> Result<Option<IndexSnapshot>> {
        tracing::info!(limit = self.sample_limit, "🔄 Building semantic index...");
        let records = self
            .store
            .sample_claims(self.sample_limit)
            .await
            .map_err(|e| Error::IndexUnavailable(format!("fetching claims: {e:#}")))?;
        let documents: Vec<Document> = records.iter().filter_map(Document::from_record).collect();
        if documents.len() < records.len() { tracing::debug!(skipped = records.len() - documents.len(), "skipped rows without claim_id"); }
        if documents.is_empty() { return Ok(None); }

        let texts: Vec<String> = documents.iter().map(Document::embedding_text).collect();
        let embedder = Arc::clone(&self.embedder);
        let cache = Arc::clone(&self.cache);
        let batch_size = self.batch_size;
        let progress = if self.show_progress { progress_bar(texts.len()) } else { ProgressBar::hidden() };
        let vectors = tokio::task::spawn_blocking(move || embed_all(embedder.as_ref(), &cache, &texts, batch_size, &progress))
            .await
            .map_err(|e| Error::IndexUnavailable(format!("embedding task failed: {e}")))?
            .map_err(Error::embedding)?;

        let snapshot = IndexSnapshot::new(documents, &vectors, self.embedder.embedder_id())
            .map_err(|e| Error::IndexUnavailable(format!("{e:#}")))?;
        Ok(Some(snapshot))
    }
}

/// Holds `building` high until dropped, including when a caller abandons the build future.
struct BuildingFlag<'a>(&'a AtomicBool);

impl<'a> BuildingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for BuildingFlag<'_> {
    fn drop(&mut self) { self.0.store(false, Ordering::SeqCst); }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} claims ({percent}%) {msg}") {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Encode `texts` in sub-batches, reusing cached vectors for unchanged content.
fn embed_all(embedder: &dyn Embedder, cache: &EmbeddingCache, texts: &[String], batch_size: usize, progress: &ProgressBar) -> anyhow::Result<Vec<Vec<f32>>> {
    let embedder_id = embedder.embedder_id().to_string();
    let hashes: Vec<String> = texts.iter().map(|t| hash_content(t)).collect();
    let cached = cache.get_many(&embedder_id, &hashes);
    let mut vectors: Vec<Option<Vec<f32>>> = hashes.iter().map(|h| cached.get(h).cloned()).collect();
    let misses: Vec<usize> = (0..texts.len()).filter(|&i| vectors[i].is_none()).collect();
    progress.inc((texts.len() - misses.len()) as u64);
    if !cached.is_empty() { tracing::debug!(hits = texts.len() - misses.len(), misses = misses.len(), "embedding cache"); }

    for chunk in misses.chunks(batch_size) {
        let batch: Vec<String> = chunk.iter().map(|&i| texts[i].clone()).collect();
        let embeddings = embedder.embed_batch(&batch)?;
        ensure!(embeddings.len() == batch.len(), "embedder returned {} vectors for {} texts", embeddings.len(), batch.len());
        let mut entries = Vec::with_capacity(chunk.len());
        for (&i, vector) in chunk.iter().zip(embeddings) {
            ensure!(vector.len() == embedder.dim(), "embedding dim mismatch: got {} expected {}", vector.len(), embedder.dim());
            entries.push(CacheEntry { content_hash: hashes[i].clone(), embedder_id: embedder_id.clone(), vector: vector.clone() });
            vectors[i] = Some(vector);
        }
        cache.put_many(&entries);
        progress.inc(chunk.len() as u64);
    }
    progress.finish_and_clear();
    vectors.into_iter().map(|v| v.ok_or_else(|| anyhow!("missing embedding"))).collect()
}
