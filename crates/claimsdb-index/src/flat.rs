use anyhow::{ensure, Result};

/// A neighbour returned by [`FlatL2Index::search`]: insertion position and Euclidean distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

/// Exhaustive Euclidean index over fixed-dimension vectors, stored row-major.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dim: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dim: usize) -> Self { Self { dim, data: Vec::new() } }

    pub fn from_vectors(dim: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut index = Self::new(dim);
        index.data.reserve(dim * vectors.len());
        for v in vectors { index.add(v)?; }
        Ok(index)
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        ensure!(self.dim > 0, "index dimension must be positive");
        ensure!(vector.len() == self.dim, "dim mismatch: got {} expected {}", vector.len(), self.dim);
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn dim(&self) -> usize { self.dim }
    pub fn len(&self) -> usize { if self.dim == 0 { 0 } else { self.data.len() / self.dim } }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn vector(&self, i: usize) -> Option<&[f32]> { self.data.chunks_exact(self.dim.max(1)).nth(i) }

    /// The `k` closest vectors, ascending by distance; equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        ensure!(query.len() == self.dim, "query dim mismatch: got {} expected {}", query.len(), self.dim);
        if k == 0 || self.is_empty() { return Ok(Vec::new()); }
        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(i, row)| (i, row.iter().zip(query).map(|(a, b)| (a - b) * (a - b)).sum::<f32>()))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(index, sq)| Neighbor { index, distance: sq.sqrt() }).collect())
    }
}
