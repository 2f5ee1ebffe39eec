//! In-memory semantic index over claim documents.
//!
//! - `flat`: exhaustive Euclidean nearest-neighbour search
//! - `snapshot`: immutable documents + vectors published as one unit
//! - `cache`: embedding reuse keyed by content hash and embedder id
//! - `manager`: lazy build, rebuild and status
//! - `retriever`: k-nearest search with the confidence gate
pub mod cache;
pub mod flat;
pub mod manager;
pub mod retriever;
pub mod snapshot;

pub use cache::{hash_content, CacheEntry, EmbeddingCache};
pub use flat::{FlatL2Index, Neighbor};
pub use manager::{IndexManager, IndexState, IndexStatus};
pub use retriever::SemanticRetriever;
pub use snapshot::IndexSnapshot;
