use std::sync::Arc;

use claimsdb_core::error::{Error, Result};
use claimsdb_core::traits::ClaimStore;

use crate::context::Evidence;

/// Structured queries against the claim store. Failures are hard errors.
pub struct LookupExecutor {
    store: Arc<dyn ClaimStore>,
}

impl LookupExecutor {
    pub fn new(store: Arc<dyn ClaimStore>) -> Self { Self { store } }

    pub async fn lookup(&self, id: &str) -> Result<Evidence> {
        let record = self.store.find_claim(id).await.map_err(Error::store)?;
        tracing::debug!(id, found = record.is_some(), "claim lookup");
        Ok(match record {
            Some(record) => Evidence::Found { id: id.to_string(), record },
            None => Evidence::NotFound { id: id.to_string() },
        })
    }

    /// Unconditional total; qualifiers in the question are not applied.
    pub async fn count(&self) -> Result<Evidence> {
        let total = self.store.count_claims().await.map_err(Error::store)?;
        Ok(Evidence::Count(total))
    }
}
