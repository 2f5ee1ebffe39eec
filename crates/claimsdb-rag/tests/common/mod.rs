use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use claimsdb_core::traits::Generator;

/// Replays a fixed list of deltas, optionally failing part-way or pacing output.
/// Records every prompt it receives and how many deltas were pulled.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    deltas: Vec<String>,
    fail_after: Option<(usize, String)>,
    refuse: Option<String>,
    delay: Option<Duration>,
    prompts: Arc<Mutex<Vec<String>>>,
    produced: Arc<AtomicUsize>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { deltas: deltas.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    /// Emit `n` deltas, then an error.
    pub fn failing_after(mut self, n: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((n, message.into()));
        self
    }

    /// Fail before the stream starts.
    pub fn refusing(mut self, message: impl Into<String>) -> Self {
        self.refuse = Some(message.into());
        self
    }

    /// Sleep before every delta.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> { self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone() }

    pub fn produced(&self) -> usize { self.produced.load(Ordering::SeqCst) }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).push(prompt.to_string());
        if let Some(message) = &self.refuse { anyhow::bail!("{message}"); }
        Ok(replay(self.deltas.clone(), self.fail_after.clone(), self.delay, Arc::clone(&self.produced)).boxed())
    }
}

fn replay(deltas: Vec<String>, fail_after: Option<(usize, String)>, delay: Option<Duration>, produced: Arc<AtomicUsize>) -> impl futures::Stream<Item = Result<String>> + Send + 'static {
    async_stream::try_stream! {
        let limit = fail_after.as_ref().map_or(deltas.len(), |(n, _)| (*n).min(deltas.len()));
        for delta in deltas.into_iter().take(limit) {
            if let Some(d) = delay { tokio::time::sleep(d).await; }
            produced.fetch_add(1, Ordering::SeqCst);
            yield delta;
        }
        if let Some((_, message)) = fail_after {
            Err::<(), _>(anyhow::anyhow!("{message}"))?;
        }
    }
}
