// Pipeline module
// Wires embedding, index, ranking, packing, templating and generation into one flow


use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{Config, RetrievalConfig};
use crate::embeddings::{DEFAULT_BATCH_SIZE, EmbeddingProvider, provider_from_config};
use crate::generation::{Completion, GenerationClient, gate_from_config};
use crate::index::{CorpusEntry, CorpusIndex, index_from_config};
use crate::retrieval::{AssembledPrompt, PromptMode, RankedItem, rank};
use crate::{LoreError, Result};

/// Retrieval query for a request: the request, a newline, then any extra context
#[inline]
pub fn compose_query(request: &str, additional_context: &str) -> String {
    format!("{}\n{}", request, additional_context)
}

pub struct LorePipeline {
    embedder: Box<dyn EmbeddingProvider>,
    index: Arc<dyn CorpusIndex>,
    generator: Option<GenerationClient>,
    retrieval: RetrievalConfig,
    batch_size: usize,
}

impl LorePipeline {
    #[inline]
    pub fn new(
        embedder: Box<dyn EmbeddingProvider>,
        index: Arc<dyn CorpusIndex>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            generator: None,
            retrieval,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_generator(mut self, generator: GenerationClient) -> Self {
        self.generator = Some(generator);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Build every component from configuration.
    ///
    /// The generation client, and with it the API key check, is only set up when
    /// `with_generation` is true.
    #[inline]
    pub async fn from_config(config: &Config, with_generation: bool) -> Result<Self> {
        config.validate()?;

        let embedder = provider_from_config(&config.embedding)?;
        let index = index_from_config(config).await?;
        let mut pipeline = Self::new(embedder, index, config.retrieval.clone())
            .with_batch_size(config.embedding.batch_size as usize);

        if with_generation {
            let generator =
                GenerationClient::new(&config.generation, gate_from_config(&config.generation))?
                    .with_relevance(
                        config.retrieval.relevance_threshold,
                        config.retrieval.top_relevant_cap,
                    );
            pipeline = pipeline.with_generator(generator);
        }

        Ok(pipeline)
    }

    #[inline]
    pub fn generator(&self) -> Option<&GenerationClient> {
        self.generator.as_ref()
    }

    #[inline]
    pub fn index(&self) -> &Arc<dyn CorpusIndex> {
        &self.index
    }

    /// Embed and upsert `entries` in batches; returns the number written
    #[inline]
    pub async fn ingest(&self, entries: &[CorpusEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        self.embedder.health_check()?;
        info!(
            "Ingesting {} entries with {} in batches of {}",
            entries.len(),
            self.embedder.model(),
            self.batch_size
        );

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(entries.len() as u64).with_style(
                ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut written = 0;
        for batch in entries.chunks(self.batch_size) {
            let documents: Vec<String> = batch.iter().map(CorpusEntry::document).collect();
            if let Some(first) = batch.first() {
                bar.set_message(first.title.clone());
            }

            let vectors = self.embedder.embed(&documents)?;
            self.index.upsert(batch, &vectors).await?;

            written += batch.len();
            bar.inc(batch.len() as u64);
            debug!("Upserted batch of {} ({}/{})", batch.len(), written, entries.len());
        }

        bar.finish_and_clear();
        info!("Ingested {} entries", written);
        Ok(written)
    }

    /// Nearest entries for `query`, ranked, using the configured `top_k`
    #[inline]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RankedItem>> {
        self.search(query, self.retrieval.top_k).await
    }

    /// Nearest `limit` entries for `query`, ranked by relevance
    #[inline]
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<RankedItem>> {
        if self.index.count().await? == 0 {
            debug!("Corpus is empty, nothing to retrieve");
            return Ok(Vec::new());
        }

        let mut vectors = self.embedder.embed(&[query.to_string()])?;
        let Some(vector) = vectors.pop() else {
            return Err(LoreError::ProviderUnavailable(
                "No embedding returned for query".to_string(),
            ));
        };

        let results = self.index.query(&vector, limit).await?;
        debug!("Query matched {} entries", results.len());
        Ok(rank(results))
    }

    /// Pack `ranked` under the configured budget and frame it for `mode`
    #[inline]
    pub fn assemble(
        &self,
        mode: PromptMode,
        instruction: &str,
        request: &str,
        ranked: &[RankedItem],
    ) -> AssembledPrompt {
        AssembledPrompt::build(
            mode,
            instruction,
            request,
            ranked,
            self.retrieval.context_budget,
            self.retrieval.budget_scope,
        )
    }

    /// Retrieve, assemble and generate for one request
    #[inline]
    pub async fn run(
        &self,
        mode: PromptMode,
        instruction: &str,
        request: &str,
        additional_context: &str,
        model_override: Option<&str>,
    ) -> Result<Completion> {
        let Some(generator) = &self.generator else {
            return Err(LoreError::Config(
                "Generation client is not configured".to_string(),
            ));
        };

        // Extra context steers retrieval and is shown to the model as part of the request
        let composed = compose_query(request, additional_context);
        let user_request = if additional_context.trim().is_empty() {
            request
        } else {
            composed.as_str()
        };

        let ranked = self.retrieve(&composed).await?;
        let prompt = self.assemble(mode, instruction, user_request, &ranked);

        generator.complete(&prompt, &ranked, model_override)
    }
}
