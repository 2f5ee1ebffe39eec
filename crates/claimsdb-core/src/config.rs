//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g. `APP_RETRIEVAL__TOP_K`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    /// Load from the current working directory.
    pub fn load() -> anyhow::Result<Self> { Self::load_in(Path::new(".")) }

    /// Load the config files found in `dir`; missing files are skipped.
    pub fn load_in(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(dir, &env_name)
    }

    pub fn load_for_env(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, env_name: env_name.to_string() };
        config.validate_for_env(env_name)?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The fully typed view of the merged configuration.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }

    pub fn env_name(&self) -> &str { &self.env_name }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        settings.validate()?;
        match env {
            "prod" | "production" => {
                if settings.embedding.use_fake {
                    return Err(Error::InvalidConfig("embedding.use_fake is not allowed in production".into()).into());
                }
            }
            "dev" | "development" => {}
            "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub store: StoreSettings,
    pub generation: GenerationSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        let r = &self.retrieval;
        if !r.distance_threshold.is_finite() || r.distance_threshold < 0.0 {
            return Err(Error::InvalidConfig(format!("retrieval.distance_threshold must be a non-negative number, got {}", r.distance_threshold)));
        }
        if r.top_k == 0 { return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into())); }
        if r.index_sample_limit == 0 { return Err(Error::InvalidConfig("retrieval.index_sample_limit must be at least 1".into())); }
        if r.embed_batch_size == 0 { return Err(Error::InvalidConfig("retrieval.embed_batch_size must be at least 1".into())); }
        if self.embedding.max_len == 0 { return Err(Error::InvalidConfig("embedding.max_len must be at least 1".into())); }
        if self.generation.timeout_secs == 0 { return Err(Error::InvalidConfig("generation.timeout_secs must be at least 1".into())); }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Rank-0 distances strictly above this trigger the fallback context.
    pub distance_threshold: f32,
    pub top_k: usize,
    pub index_sample_limit: usize,
    pub embed_batch_size: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self { Self { distance_threshold: 1.0, top_k: 3, index_sample_limit: 5000, embed_batch_size: 64 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: String,
    pub use_fake: bool,
    pub max_len: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self { Self { model_dir: "models/all-MiniLM-L6-v2".to_string(), use_fake: false, max_len: 256 } }
}

impl EmbeddingSettings {
    pub fn model_path(&self) -> PathBuf { expand_path(&self.model_dir) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub url: String,
}

impl Default for StoreSettings {
    fn default() -> Self { Self { url: "postgres://claimsuser@localhost:5432/claimsdb".to_string() } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self { Self { endpoint: "http://localhost:11434".to_string(), model: "llama3.2".to_string(), timeout_secs: 60 } }
}

/// Turn a configured directory such as `embedding.model_dir` into a path.
/// Environment variables are substituted before a leading `~`; an unset variable leaves the text untouched.
pub fn expand_path<S: AsRef<str>>(raw: S) -> PathBuf {
    let raw = raw.as_ref();
    let with_vars = match shellexpand::env(raw) {
        Ok(expanded) => expanded,
        Err(_) => std::borrow::Cow::Borrowed(raw),
    };
    PathBuf::from(shellexpand::tilde(&with_vars).into_owned())
}

/// Anchor a relative configured path at the config directory, so `model_dir = "models/x"` does not depend on the cwd.
pub fn resolve_with_base<S: AsRef<str>>(config_dir: &Path, raw: S) -> PathBuf {
    let path = expand_path(raw);
    if path.is_absolute() { path } else { config_dir.join(path) }
}
