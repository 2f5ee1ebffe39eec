//! Claims question answering: route, gather evidence, render context, stream the answer.
use std::sync::Arc;
use std::time::Duration;

use claimsdb_core::config::Settings;
use claimsdb_core::error::Result;
use claimsdb_core::traits::{ClaimStore, Embedder, Generator};
use claimsdb_core::types::{Intent, Query};
use claimsdb_index::{IndexManager, SemanticRetriever};

pub mod context;
pub mod lookup;
pub mod router;
pub mod streamer;

pub use context::{assemble, Evidence, PromptContext};
pub use lookup::LookupExecutor;
pub use router::{IntentRouter, Rule};
pub use streamer::{FragmentStream, GenerationStreamer};

pub struct ClaimsAssistant {
    router: IntentRouter,
    lookup: LookupExecutor,
    index: Arc<IndexManager>,
    retriever: SemanticRetriever,
    streamer: GenerationStreamer,
    top_k: usize,
}

impl ClaimsAssistant {
    pub fn new(store: Arc<dyn ClaimStore>, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>, settings: &Settings) -> Result<Self> {
        let index = Arc::new(IndexManager::new(Arc::clone(&store), embedder, &settings.retrieval));
        Self::with_index(store, index, generator, settings)
    }

    /// Share an existing index manager, e.g. one that was built ahead of time.
    pub fn with_index(store: Arc<dyn ClaimStore>, index: Arc<IndexManager>, generator: Arc<dyn Generator>, settings: &Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            router: IntentRouter::new()?,
            lookup: LookupExecutor::new(store),
            retriever: SemanticRetriever::new(Arc::clone(&index), settings.retrieval.distance_threshold),
            index,
            streamer: GenerationStreamer::new(generator, Duration::from_secs(settings.generation.timeout_secs)),
            top_k: settings.retrieval.top_k,
        })
    }

    pub fn index(&self) -> &Arc<IndexManager> { &self.index }

    pub fn router(&self) -> &IntentRouter { &self.router }

    /// Classify the query and gather its evidence. Store failures propagate.
    pub async fn prepare_context(&self, query: &Query) -> Result<(Intent, PromptContext)> {
        let intent = self.router.classify(&query.text);
        tracing::info!(intent = intent.label(), "🧭 Intent detected");
        let evidence = match &intent {
            Intent::IdLookup { id } => self.lookup.lookup(id).await?,
            Intent::CountQuery => self.lookup.count().await?,
            Intent::SemanticSearch { text } => {
                self.index.ensure_built().await;
                Evidence::Semantic(self.retriever.search(text, self.top_k).await)
            }
        };
        Ok((intent, assemble(&evidence)))
    }

    /// Answer one message. The conversation id is logged but carries no history.
    pub async fn answer(&self, query: Query) -> Result<FragmentStream> {
        let (_, _, stream) = self.answer_with_context(query).await?;
        Ok(stream)
    }

    /// Like [`answer`](Self::answer), also handing back the intent and context the stream was started with.
    pub async fn answer_with_context(&self, query: Query) -> Result<(Intent, PromptContext, FragmentStream)> {
        if let Some(conversation) = &query.conversation_id { tracing::debug!(conversation = %conversation, "answering"); }
        let (intent, context) = self.prepare_context(&query).await?;
        let stream = self.streamer.stream(&context, &query.text);
        Ok((intent, context, stream))
    }
}
