//! Text generation backends.
//!
//! `OllamaGenerator` talks to a local Ollama server over its streaming
//! `/api/generate` endpoint.
pub mod ollama;

pub use ollama::{ndjson_deltas, OllamaGenerator};
