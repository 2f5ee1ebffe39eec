use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;

use claimsdb_core::config::EmbeddingSettings;
use claimsdb_core::traits::Embedder;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

/// Dimension used by the fake embedder; matches all-MiniLM-L6-v2.
pub const FAKE_DIM: usize = 384;

/// BERT sentence encoder (all-MiniLM-L6-v2 layout) with masked mean pooling.
pub struct SentenceEmbedder { model: BertModel, tokenizer: Tokenizer, device: Device, dim: usize, max_len: usize, id: String }

impl SentenceEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = device::select_device();
        tracing::info!("🔄 Loading sentence encoder from {}...", model_dir.display());
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw_config)?["hidden_size"].as_u64().ok_or_else(|| anyhow!("config.json has no hidden_size"))? as usize;
        let safetensors = model_dir.join("model.safetensors");
        let vb = if safetensors.exists() {
            VarBuilder::from_buffered_safetensors(std::fs::read(&safetensors)?, DTYPE, &device)?
        } else {
            let weights_path = model_dir.join("pytorch_model.bin");
            let weights = candle_core::pickle::read_all(&weights_path).with_context(|| format!("reading {}", weights_path.display()))?;
            let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
            VarBuilder::from_tensors(weights_map, DTYPE, &device)
        };
        let model = BertModel::load(vb, &config)?;
        let name = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "bert".to_string());
        tracing::info!("✅ Sentence encoder loaded (dim={})", dim);
        Ok(Self { model, tokenizer, device, dim, max_len, id: format!("local:{}:d{}", name, dim) })
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let out: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        if start.elapsed().as_millis() > 100 * texts.len() as u128 { tracing::warn!("⚠️  Slow embedding ({} texts in {:?})", texts.len(), start.elapsed()); }
        Ok(out)
    }
}

impl Embedder for SentenceEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        self.encode(texts)
    }
}

/// Deterministic hashed bag-of-tokens embedder for tests and offline development.
pub struct FakeEmbedder { dim: usize, id: String }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, id: format!("fake:xxh64:d{}", dim) } }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        for (i, token) in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).enumerate() {
            let mut hasher = XxHash64::with_seed(0); token.hash(&mut hasher); let h = hasher.finish();
            let idx = (h as usize) % self.dim; let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_text(t)).collect()) }
}

/// Pick the embedder described by `settings`. `APP_USE_FAKE_EMBEDDINGS=1` forces the fake one.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    let env_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if settings.use_fake || env_fake { tracing::info!("🧪 Using FakeEmbedder"); return Ok(Box::new(FakeEmbedder::new(FAKE_DIM))); }
    let model_dir = resolve_model_dir(&settings.model_path())?;
    Ok(Box::new(SentenceEmbedder::load(&model_dir, settings.max_len)?))
}

fn resolve_model_dir(configured: &Path) -> Result<PathBuf> {
    if configured.exists() { return Ok(configured.to_path_buf()); }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { tracing::info!("📦 Using APP_MODEL_DIR: {}", p.display()); return Ok(p); } }
    if let Ok(dir) = std::env::var("MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { tracing::info!("📦 Using MODEL_DIR: {}", p.display()); return Ok(p); } }
    Err(anyhow!("Could not locate sentence encoder directory (tried {})", configured.display()))
}
