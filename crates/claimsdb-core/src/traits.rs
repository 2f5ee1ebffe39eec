use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::types::Record;

pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `fake:xxh64:d384`); keys the embedding cache.
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Read access to the `claims` table.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Exact match on `claim_id`; at most one record.
    async fn find_claim(&self, claim_id: &str) -> anyhow::Result<Option<Record>>;
    /// Unconditional row count.
    async fn count_claims(&self) -> anyhow::Result<u64>;
    /// Up to `limit` rows in store order, projected to
    /// `claim_id, claim_type, claim_status, diagnosis_code`.
    async fn sample_claims(&self, limit: usize) -> anyhow::Result<Vec<Record>>;
}

/// Single-turn text generation. Each call is a fresh session with no history.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn stream(&self, prompt: &str) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>>;
}
