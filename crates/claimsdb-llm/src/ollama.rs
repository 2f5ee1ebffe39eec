use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use claimsdb_core::config::GenerationSettings;
use claimsdb_core::traits::Generator;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One NDJSON line of a streaming `/api/generate` response.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

pub struct OllamaGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(settings: &GenerationSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(settings.timeout_secs.clamp(1, 10)))
            .build()
            .context("building HTTP client")?;
        Ok(Self { client, endpoint: settings.endpoint.trim_end_matches('/').to_string(), model: settings.model.clone() })
    }

    pub fn model(&self) -> &str { &self.model }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        let url = format!("{}/api/generate", self.endpoint);
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "🧠 Starting generation");
        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest { model: &self.model, prompt, stream: true })
            .send()
            .await
            .with_context(|| format!("generation endpoint unreachable at {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("generation endpoint returned {}: {}", status.as_u16(), body.trim());
        }
        Ok(ndjson_deltas(response.bytes_stream()).boxed())
    }
}

/// Turn a byte stream of newline-delimited JSON chunks into text deltas.
///
/// Lines may be split across network chunks; a trailing line without a
/// newline is still parsed. A chunk carrying `error` ends the stream with that error.
pub fn ndjson_deltas<S, B, E>(bytes: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    async_stream::try_stream! {
        futures::pin_mut!(bytes);
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.context("reading generation stream")?;
            buf.extend_from_slice(chunk.as_ref());
            while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                if let Some(delta) = parse_line(&line)? { yield delta; }
            }
        }
        if let Some(delta) = parse_line(&buf)? { yield delta; }
    }
}

fn parse_line(line: &[u8]) -> Result<Option<String>> {
    let text = std::str::from_utf8(line).context("generation stream is not UTF-8")?.trim();
    if text.is_empty() { return Ok(None); }
    let chunk: GenerateChunk = serde_json::from_str(text).with_context(|| format!("malformed generation chunk: {text}"))?;
    if let Some(err) = chunk.error { bail!("{err}"); }
    if chunk.done { tracing::debug!("generation finished"); }
    Ok(Some(chunk.response).filter(|r| !r.is_empty()))
}
