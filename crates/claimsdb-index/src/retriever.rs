use std::sync::Arc;

use claimsdb_core::types::SearchResult;

use crate::manager::IndexManager;

/// k-nearest search over the current snapshot with the rank-0 confidence gate.
pub struct SemanticRetriever {
    index: Arc<IndexManager>,
    threshold: f32,
}

impl SemanticRetriever {
    pub fn new(index: Arc<IndexManager>, threshold: f32) -> Self { Self { index, threshold } }

    pub fn threshold(&self) -> f32 { self.threshold }

    pub fn index(&self) -> &Arc<IndexManager> { &self.index }

    /// Never fails. An unbuilt index, a blank query, a query that encodes to the
    /// zero vector, or an encoding error all degrade to an empty fallback result.
    pub async fn search(&self, query: &str, k: usize) -> SearchResult {
        if query.trim().is_empty() {
            tracing::info!("blank query; using fallback context");
            return SearchResult::fallback();
        }
        let Some(snapshot) = self.index.snapshot().await else {
            tracing::warn!("⚠️  Semantic index unavailable; using fallback context");
            return SearchResult::fallback();
        };
        let embedder = self.index.embedder();
        let text = query.to_string();
        let hits = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
            let vector = embedder.embed_batch(&[text])?.pop().ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))?;
            if vector.iter().all(|x| *x == 0.0) { return Ok(None); }
            snapshot.nearest(&vector, k).map(Some)
        })
        .await;
        let results = match hits {
            Ok(Ok(Some(results))) => results,
            Ok(Ok(None)) => {
                tracing::info!("query has no embeddable content; using fallback context");
                return SearchResult::fallback();
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "⚠️  Query encoding failed; using fallback context");
                return SearchResult::fallback();
            }
            Err(err) => {
                tracing::warn!(error = %err, "⚠️  Search task failed; using fallback context");
                return SearchResult::fallback();
            }
        };
        match results.first() {
            Some(best) if best.distance > self.threshold => {
                tracing::info!(distance = best.distance, threshold = self.threshold, "no confident match");
                for hit in &results { tracing::debug!(distance = hit.distance, id = %hit.document.id, "rejected hit"); }
            }
            Some(best) => tracing::debug!(distance = best.distance, id = %best.document.id, "semantic match"),
            None => tracing::info!("semantic search returned no documents"),
        }
        SearchResult::gated(results, self.threshold)
    }
}
