use anyhow::{ensure, Result};
use chrono::{DateTime, Utc};

use claimsdb_core::types::{Document, ScoredDocument};

use crate::flat::FlatL2Index;

/// Immutable point-in-time view: documents and their vectors, index-aligned.
#[derive(Debug)]
pub struct IndexSnapshot {
    documents: Vec<Document>,
    index: FlatL2Index,
    embedder_id: String,
    built_at: DateTime<Utc>,
}

impl IndexSnapshot {
    pub fn new(documents: Vec<Document>, vectors: &[Vec<f32>], embedder_id: impl Into<String>) -> Result<Self> {
        ensure!(!documents.is_empty(), "snapshot needs at least one document");
        ensure!(documents.len() == vectors.len(), "{} documents but {} vectors", documents.len(), vectors.len());
        let dim = vectors[0].len();
        let index = FlatL2Index::from_vectors(dim, vectors)?;
        Ok(Self { documents, index, embedder_id: embedder_id.into(), built_at: Utc::now() })
    }

    pub fn len(&self) -> usize { self.documents.len() }
    pub fn is_empty(&self) -> bool { self.documents.is_empty() }
    pub fn dim(&self) -> usize { self.index.dim() }
    pub fn documents(&self) -> &[Document] { &self.documents }
    pub fn embedder_id(&self) -> &str { &self.embedder_id }
    pub fn built_at(&self) -> DateTime<Utc> { self.built_at }

    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        Ok(self
            .index
            .search(query, k)?
            .into_iter()
            .map(|n| ScoredDocument { document: self.documents[n.index].clone(), distance: n.distance })
            .collect())
    }
}
