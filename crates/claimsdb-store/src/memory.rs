use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use claimsdb_core::traits::ClaimStore;
use claimsdb_core::types::Record;

use crate::DOCUMENT_COLUMNS;

/// A `claims` table held in memory, rows kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryClaimStore {
    rows: RwLock<Vec<Record>>,
}

impl MemoryClaimStore {
    pub fn new() -> Self { Self::default() }

    pub fn from_records(rows: Vec<Record>) -> Self { Self { rows: RwLock::new(rows) } }

    pub async fn insert(&self, record: Record) { self.rows.write().await.push(record); }

    pub async fn len(&self) -> usize { self.rows.read().await.len() }

    pub async fn is_empty(&self) -> bool { self.rows.read().await.is_empty() }
}

#[async_trait]
impl ClaimStore for MemoryClaimStore {
    async fn find_claim(&self, claim_id: &str) -> Result<Option<Record>> {
        Ok(self.rows.read().await.iter().find(|r| r.get("claim_id") == Some(claim_id)).cloned())
    }

    async fn count_claims(&self) -> Result<u64> { Ok(self.rows.read().await.len() as u64) }

    async fn sample_claims(&self, limit: usize) -> Result<Vec<Record>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .take(limit)
            .map(|row| DOCUMENT_COLUMNS.iter().map(|c| (c.to_string(), row.get(c).map(str::to_string))).collect())
            .collect())
    }
}
