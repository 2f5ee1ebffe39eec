//! Drives the generative model and forwards deltas as [`ResponseFragment`]s.
//!
//! A producer task pulls from the model and pushes into a channel of capacity
//! one, so it is never more than one fragment ahead of the consumer. The
//! stream always ends with `Done` unless the consumer cancels first.
use anyhow::anyhow;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use claimsdb_core::error::Error;
use claimsdb_core::traits::Generator;
use claimsdb_core::types::ResponseFragment;

use crate::context::PromptContext;

pub struct GenerationStreamer {
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl GenerationStreamer {
    pub fn new(generator: Arc<dyn Generator>, timeout: Duration) -> Self { Self { generator, timeout } }

    /// Start a fresh, history-less generation for `user_message` over `context`.
    pub fn stream(&self, context: &PromptContext, user_message: &str) -> FragmentStream {
        let (tx, rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let prompt = context.prompt(user_message);
        tokio::spawn(produce(Arc::clone(&self.generator), prompt, self.timeout, tx, token.clone()));
        FragmentStream { rx, token }
    }
}

async fn produce(generator: Arc<dyn Generator>, prompt: String, limit: Duration, tx: mpsc::Sender<ResponseFragment>, token: CancellationToken) {
    let outcome = tokio::select! {
        biased;
        () = token.cancelled() => {
            tracing::debug!("generation cancelled by consumer");
            return;
        }
        outcome = pump(generator.as_ref(), &prompt, limit, &tx) => outcome,
    };
    match outcome {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!("consumer went away; generation stopped");
            return;
        }
        Err(err) => {
            let err = Error::generation(err);
            tracing::error!(error = %err, "❌ Generation failed");
            if tx.send(ResponseFragment::error(err.detail())).await.is_err() { return; }
        }
    }
    let _ = tx.send(ResponseFragment::Done).await;
}

/// Forward non-empty deltas in order. `Ok(false)` means the receiver is gone.
async fn pump(generator: &dyn Generator, prompt: &str, limit: Duration, tx: &mpsc::Sender<ResponseFragment>) -> anyhow::Result<bool> {
    let mut upstream = timeout(limit, generator.stream(prompt))
        .await
        .map_err(|_| anyhow!("generation did not start within {:?}", limit))??;
    loop {
        let next = timeout(limit, upstream.next()).await.map_err(|_| anyhow!("no output from the model for {:?}", limit))?;
        match next {
            None => return Ok(true),
            Some(Ok(delta)) if delta.is_empty() => continue,
            Some(Ok(delta)) => {
                if tx.send(ResponseFragment::Text(delta)).await.is_err() { return Ok(false); }
            }
            Some(Err(err)) => return Err(err),
        }
    }
}

/// Consumer side of a generation. Dropping it cancels the producer.
pub struct FragmentStream {
    rx: mpsc::Receiver<ResponseFragment>,
    token: CancellationToken,
}

impl FragmentStream {
    /// Stop pulling deltas from the model; fragments already queued are discarded.
    pub fn cancel(&mut self) {
        self.token.cancel();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    pub fn is_cancelled(&self) -> bool { self.token.is_cancelled() }
}

impl Stream for FragmentStream {
    type Item = ResponseFragment;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> { self.rx.poll_recv(cx) }
}

impl Drop for FragmentStream {
    fn drop(&mut self) { self.token.cancel(); }
}
