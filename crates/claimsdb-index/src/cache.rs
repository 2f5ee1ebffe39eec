//! In-memory embedding cache keyed by `(content_hash, embedder_id)`.
//!
//! Consulted before calling the embedder and written through on misses, so an
//! index rebuild over mostly unchanged claims only encodes the new texts.
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub content_hash: String,
    pub embedder_id: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: Mutex<HashMap<(String, String), Vec<f32>>>,
}

pub fn hash_content(s: &str) -> String { blake3::hash(s.as_bytes()).to_hex().to_string() }

impl EmbeddingCache {
    pub fn new() -> Self { Self::default() }

    pub fn get_many(&self, embedder_id: &str, hashes: &[String]) -> HashMap<String, Vec<f32>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = HashMap::new();
        for h in hashes {
            if let Some(v) = entries.get(&(h.clone(), embedder_id.to_string())) { out.insert(h.clone(), v.clone()); }
        }
        out
    }

    pub fn put_many(&self, new_entries: &[CacheEntry]) {
        if new_entries.is_empty() { return; }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for e in new_entries { entries.insert((e.content_hash.clone(), e.embedder_id.clone()), e.vector.clone()); }
    }

    pub fn len(&self) -> usize { self.entries.lock().unwrap_or_else(PoisonError::into_inner).len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}
