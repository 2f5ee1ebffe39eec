use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use claimsdb_core::config::RetrievalSettings;
use claimsdb_core::traits::{ClaimStore, Embedder};
use claimsdb_core::types::Record;
use claimsdb_embed::{FakeEmbedder, FAKE_DIM};
use claimsdb_index::{FlatL2Index, IndexManager, IndexState, SemanticRetriever};
use claimsdb_store::MemoryClaimStore;

fn claim(id: &str, claim_type: &str, status: &str, diagnosis: &str) -> Record {
    Record::new().with("claim_id", id).with("claim_type", claim_type).with("claim_status", status).with("diagnosis_code", diagnosis)
}

fn sample_store() -> Arc<MemoryClaimStore> {
    Arc::new(MemoryClaimStore::from_records(vec![
        claim("CLM-001", "Dental", "Approved", "K02.9"),
        claim("CLM-002", "Vision", "Denied", "H52.1"),
        claim("CLM-003", "Medical", "Pending", "J18.9"),
    ]))
}

/// Counts `sample_claims` calls and sleeps so concurrent callers overlap.
struct SlowCountingStore { inner: MemoryClaimStore, calls: AtomicUsize, fail: bool }

#[async_trait]
impl ClaimStore for SlowCountingStore {
    async fn find_claim(&self, id: &str) -> anyhow::Result<Option<Record>> { self.inner.find_claim(id).await }
    async fn count_claims(&self) -> anyhow::Result<u64> { self.inner.count_claims().await }
    async fn sample_claims(&self, limit: usize) -> anyhow::Result<Vec<Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.fail { anyhow::bail!("connection refused"); }
        self.inner.sample_claims(limit).await
    }
}

struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn embedder_id(&self) -> &str { "broken" }
    fn dim(&self) -> usize { 4 }
    fn max_len(&self) -> usize { 16 }
    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { anyhow::bail!("model not loaded") }
}

/// Maps every text to the same vector, so all distances tie.
struct ConstantEmbedder;

impl Embedder for ConstantEmbedder {
    fn embedder_id(&self) -> &str { "constant" }
    fn dim(&self) -> usize { 2 }
    fn max_len(&self) -> usize { 16 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect()) }
}

fn fake() -> Arc<dyn Embedder> { Arc::new(FakeEmbedder::new(FAKE_DIM)) }

#[test]
fn flat_index_orders_by_distance_then_insertion() -> anyhow::Result<()> {
    let index = FlatL2Index::from_vectors(2, &[vec![3.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]])?;
    let hits = index.search(&[0.0, 0.0], 3)?;
    assert_eq!(hits.iter().map(|n| n.index).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!((hits[0].distance - 1.0).abs() < 1e-6);
    assert_eq!(index.search(&[0.0, 0.0], 10)?.len(), 4);
    assert!(index.search(&[0.0], 1).is_err());
    let mut index = index;
    assert!(index.add(&[1.0, 2.0, 3.0]).is_err());
    Ok(())
}

#[tokio::test]
async fn unbuilt_index_falls_back() {
    let manager = Arc::new(IndexManager::new(sample_store(), fake(), &RetrievalSettings::default()));
    let retriever = SemanticRetriever::new(Arc::clone(&manager), 1.0);
    let result = retriever.search("dental claims", 3).await;
    assert!(result.fallback_needed);
    assert!(result.results.is_empty());
    assert_eq!(manager.status().await.state, IndexState::Unbuilt);
}

#[tokio::test]
async fn exact_document_text_is_a_confident_match() {
    let manager = Arc::new(IndexManager::new(sample_store(), fake(), &RetrievalSettings::default()));
    let snapshot = manager.ensure_built().await.expect("index builds");
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.dim(), FAKE_DIM);
    let text = snapshot.documents()[1].embedding_text();

    let retriever = SemanticRetriever::new(Arc::clone(&manager), 1.0);
    let result = retriever.search(&text, 3).await;
    assert!(!result.fallback_needed);
    assert_eq!(result.results.len(), 3);
    assert_eq!(result.results[0].document.id, "CLM-002");
    assert!(result.results[0].distance < 1e-4);
    assert!(result.results.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn threshold_is_strict() {
    let manager = Arc::new(IndexManager::new(sample_store(), fake(), &RetrievalSettings::default()));
    manager.ensure_built().await.expect("index builds");
    let open = SemanticRetriever::new(Arc::clone(&manager), f32::MAX).search("unrelated words entirely", 1).await;
    let best = open.results[0].distance;

    let at = SemanticRetriever::new(Arc::clone(&manager), best).search("unrelated words entirely", 1).await;
    assert!(!at.fallback_needed);
    let below = SemanticRetriever::new(Arc::clone(&manager), best - 1e-3).search("unrelated words entirely", 1).await;
    assert!(below.fallback_needed);
    assert!(below.results.is_empty());
}

#[tokio::test]
async fn rebuild_is_deterministic() {
    let manager = Arc::new(IndexManager::new(sample_store(), fake(), &RetrievalSettings::default()));
    let retriever = SemanticRetriever::new(Arc::clone(&manager), 1.0);
    manager.rebuild().await.expect("first build");
    let first = retriever.search("denied vision claim", 3).await;
    manager.rebuild().await.expect("second build");
    let second = retriever.search("denied vision claim", 3).await;
    assert_eq!(first, second);
    assert_eq!(manager.status().await.build_attempts, 2);
    assert!(!manager.cache().is_empty());
}

#[tokio::test]
async fn concurrent_ensure_built_runs_one_build() {
    let store = Arc::new(SlowCountingStore { inner: MemoryClaimStore::from_records(vec![claim("CLM-001", "Dental", "Approved", "K02.9")]), calls: AtomicUsize::new(0), fail: false });
    let manager = Arc::new(IndexManager::new(store.clone(), fake(), &RetrievalSettings::default()));
    let handles: Vec<_> = (0..8).map(|_| { let m = Arc::clone(&manager); tokio::spawn(async move { m.ensure_built().await.is_some() }) }).collect();
    for h in handles { assert!(h.await.expect("task joins")); }
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    assert_eq!(manager.status().await.state, IndexState::Ready);
}

#[tokio::test]
async fn concurrent_failed_build_is_not_retried_by_waiters() {
    let store = Arc::new(SlowCountingStore { inner: MemoryClaimStore::new(), calls: AtomicUsize::new(0), fail: true });
    let manager = Arc::new(IndexManager::new(store.clone(), fake(), &RetrievalSettings::default()));
    let handles: Vec<_> = (0..4).map(|_| { let m = Arc::clone(&manager); tokio::spawn(async move { m.ensure_built().await.is_none() }) }).collect();
    for h in handles { assert!(h.await.expect("task joins")); }
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    assert_eq!(manager.status().await.state, IndexState::Unbuilt);
}

#[tokio::test]
async fn empty_store_leaves_index_unset() {
    let manager = IndexManager::new(Arc::new(MemoryClaimStore::new()), fake(), &RetrievalSettings::default());
    assert!(manager.ensure_built().await.is_none());
    assert!(!manager.is_ready().await);
}

#[tokio::test]
async fn rows_without_claim_id_are_skipped() {
    let store = Arc::new(MemoryClaimStore::from_records(vec![
        claim("  ", "Dental", "Approved", "K02.9"),
        Record::new().with_null("claim_id").with("claim_type", "Vision"),
        claim("CLM-009", "Medical", "Pending", "J18.9"),
    ]));
    let manager = IndexManager::new(store, fake(), &RetrievalSettings::default());
    let snapshot = manager.ensure_built().await.expect("one valid row");
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.documents()[0].id, "CLM-009");
}

#[tokio::test]
async fn embedding_failure_leaves_index_unset() {
    let manager = Arc::new(IndexManager::new(sample_store(), Arc::new(BrokenEmbedder), &RetrievalSettings::default()));
    assert!(manager.ensure_built().await.is_none());
    let result = SemanticRetriever::new(Arc::clone(&manager), 1.0).search("anything", 3).await;
    assert!(result.fallback_needed && result.results.is_empty());
}

/// Delegates to the fake embedder until switched off.
struct ToggleEmbedder { inner: FakeEmbedder, broken: AtomicBool }

impl Embedder for ToggleEmbedder {
    fn embedder_id(&self) -> &str { self.inner.embedder_id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if self.broken.load(Ordering::SeqCst) { anyhow::bail!("model unloaded"); }
        self.inner.embed_batch(texts)
    }
}

#[tokio::test]
async fn failed_rebuild_clears_previous_snapshot() {
    let embedder = Arc::new(ToggleEmbedder { inner: FakeEmbedder::new(FAKE_DIM), broken: AtomicBool::new(false) });
    let store = Arc::new(MemoryClaimStore::from_records(vec![claim("CLM-001", "Dental", "Approved", "K02.9")]));
    let manager = IndexManager::new(store.clone(), embedder.clone(), &RetrievalSettings::default());
    manager.ensure_built().await.expect("builds");
    // Cached vectors would mask the failure, so add a row that must be encoded.
    store.insert(claim("CLM-002", "Vision", "Denied", "H52.1")).await;
    embedder.broken.store(true, Ordering::SeqCst);
    assert!(manager.rebuild().await.is_none());
    assert!(!manager.is_ready().await);
    assert_eq!(manager.status().await.state, IndexState::Unbuilt);
}

#[tokio::test]
async fn equal_distances_keep_store_order() {
    let manager = Arc::new(IndexManager::new(sample_store(), Arc::new(ConstantEmbedder), &RetrievalSettings::default()));
    manager.ensure_built().await.expect("builds");
    let result = SemanticRetriever::new(manager, 1.0).search("anything", 2).await;
    let ids: Vec<_> = result.documents().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["CLM-001", "CLM-002"]);
    assert!(!result.fallback_needed);
}

#[tokio::test]
async fn small_batches_embed_every_document() {
    let settings = RetrievalSettings { embed_batch_size: 2, index_sample_limit: 2, ..RetrievalSettings::default() };
    let manager = IndexManager::new(sample_store(), fake(), &settings);
    let snapshot = manager.ensure_built().await.expect("builds");
    assert_eq!(snapshot.len(), 2);
    assert_eq!(manager.cache().len(), 2);
}

#[tokio::test]
async fn abandoned_build_does_not_stay_building() {
    let store = Arc::new(SlowCountingStore { inner: MemoryClaimStore::from_records(vec![claim("CLM-001", "Dental", "Approved", "K02.9")]), calls: AtomicUsize::new(0), fail: false });
    let manager = IndexManager::new(store.clone(), fake(), &RetrievalSettings::default());
    assert!(tokio::time::timeout(Duration::from_millis(10), manager.ensure_built()).await.is_err());
    assert_eq!(manager.status().await.state, IndexState::Unbuilt);
    assert!(manager.ensure_built().await.is_some(), "a later call still builds");
    assert_eq!(manager.status().await.state, IndexState::Ready);
    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn blank_query_falls_back_on_populated_index() {
    let manager = Arc::new(IndexManager::new(sample_store(), fake(), &RetrievalSettings::default()));
    manager.ensure_built().await.expect("index builds");
    let retriever = SemanticRetriever::new(manager, 1.0);
    for query in ["", "   ", "?!-- ..."] {
        let result = retriever.search(query, 3).await;
        assert!(result.fallback_needed, "{query:?}");
        assert!(result.results.is_empty(), "{query:?}");
    }
}
