use anyhow::Context;
use indicatif::ProgressBar;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use policydb_core::config::{Config, Settings};
use policydb_core::data_processor::DataProcessor;
use policydb_core::error::{Error, Result};
use policydb_core::traits::{Embedder, RuleEvaluator};
use policydb_core::types::{Chunk, TraceRecord};
use policydb_decision::{AuditReport, DecisionSynthesizer, ReportPeriod, TraceStore};
use policydb_extract::EntityExtractor;
use policydb_hybrid::{CorpusStore, HybridRanker};
use policydb_rules::{RuleEngine, RuleSet};
use policydb_vector::{embed_chunks, EmbeddingCache};

use crate::cancel::CancelToken;
use crate::response::{QueryRequest, QueryResponse};
use crate::stages;

const EMBED_BATCH: usize = 32;

/// Owns every stage and the shared corpus. Cheap to share behind an `Arc`;
/// queries and ingestion may run concurrently.
pub struct Pipeline {
    settings: Settings,
    store: Arc<CorpusStore>,
    embedder: Arc<dyn Embedder>,
    cache: Arc<EmbeddingCache>,
    processor: DataProcessor,
    extractor: EntityExtractor,
    ranker: HybridRanker,
    rules: Arc<dyn RuleEvaluator>,
    synthesizer: DecisionSynthesizer,
    traces: TraceStore,
}

impl Pipeline {
    /// Validates `settings` and assembles the stages. Configuration errors
    /// (weights, vocabularies) surface here, before the first query.
    pub fn new(settings: Settings, embedder: Arc<dyn Embedder>, rules: Arc<dyn RuleEvaluator>) -> Result<Self> {
        settings.validate()?;
        let ranker = HybridRanker::new(settings.retrieval.clone())?;
        let extractor = EntityExtractor::new(&settings.extraction)?;
        let synthesizer = DecisionSynthesizer::new(settings.decision.clone())?;
        tracing::info!(embedder = embedder.id(), dim = embedder.dim(), rules = rules.rule_count(), "pipeline ready");
        Ok(Self {
            processor: DataProcessor::new(settings.chunking.clone()),
            settings,
            store: Arc::new(CorpusStore::new()),
            embedder,
            cache: Arc::new(EmbeddingCache::new()),
            extractor,
            ranker,
            rules,
            synthesizer,
            traces: TraceStore::new(),
        })
    }

    /// Builds the configured embedder and rule set.
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let embedder = policydb_embed::default_embedder(&settings.embedding)?;
        let rules = RuleEngine::new(RuleSet::from_settings(&settings)?).with_vocabulary(&settings.extraction.procedures)?;
        Ok(Self::new(settings, embedder, Arc::new(rules))?)
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> { Self::from_settings(config.settings().clone()) }

    pub fn settings(&self) -> &Settings { &self.settings }
    pub fn store(&self) -> &CorpusStore { &self.store }
    pub fn traces(&self) -> &TraceStore { &self.traces }

    /// Embeds and publishes `chunks` as one new snapshot generation.
    pub async fn ingest(&self, chunks: Vec<Chunk>) -> Result<u64> {
        self.ingest_with_progress(chunks, None).await
    }

    async fn ingest_with_progress(&self, chunks: Vec<Chunk>, progress: Option<ProgressBar>) -> Result<u64> {
        if chunks.is_empty() { return Ok(self.store.generation()); }
        let embedder = self.embedder.clone();
        let cache = self.cache.clone();
        let (chunks, vectors) = tokio::task::spawn_blocking(move || {
            let vectors = embed_chunks(&chunks, embedder.as_ref(), &cache, EMBED_BATCH, progress.as_ref());
            (chunks, vectors)
        })
        .await
        .map_err(|e| Error::Operation(format!("embedding task failed: {e}")))?;
        let vectors = vectors.map_err(|e| match e.downcast::<Error>() {
            Ok(err) => err,
            Err(other) => Error::Embedding(other.to_string()),
        })?;
        self.store.ingest(chunks, vectors)
    }

    /// Chunks `text` as one document and ingests it.
    pub async fn ingest_text(&self, document_id: &str, text: &str) -> Result<u64> {
        let chunks = self.processor.chunk_document(document_id, text);
        tracing::debug!(document = document_id, chunks = chunks.len(), "chunked document");
        self.ingest(chunks).await
    }

    /// Ingests every `.txt` file under `dir`, one snapshot per document.
    /// Returns `(documents, chunks)`.
    pub async fn ingest_directory(&self, dir: &Path, progress: Option<&ProgressBar>) -> anyhow::Result<(usize, usize)> {
        let processor = self.processor.clone();
        let dir = dir.to_path_buf();
        let documents = tokio::task::spawn_blocking(move || processor.process_directory(&dir)).await??;
        let total_chunks: usize = documents.iter().map(|(_, c)| c.len()).sum();
        if let Some(pb) = progress { pb.set_length(total_chunks as u64); }
        let count = documents.len();
        for (document_id, chunks) in documents {
            self.ingest_with_progress(chunks, progress.cloned())
                .await
                .with_context(|| format!("ingesting {document_id}"))?;
        }
        tracing::info!(documents = count, chunks = total_chunks, "directory ingested");
        Ok((count, total_chunks))
    }

    pub fn remove_document(&self, document_id: &str) -> Result<usize> { self.store.remove_document(document_id) }

    pub async fn answer(&self, request: QueryRequest) -> Result<QueryResponse> {
        self.answer_with_cancel(request, &CancelToken::new()).await
    }

    /// Runs every stage for one request. Only cancellation is an error:
    /// timeouts and empty retrievals become `requires_review` or `pending`
    /// decisions. A cancelled query records no trace.
    pub async fn answer_with_cancel(&self, request: QueryRequest, cancel: &CancelToken) -> Result<QueryResponse> {
        let started = Instant::now();
        let pipeline = &self.settings.pipeline;
        cancel.check()?;

        let query = self.extractor.parse(&request.text, request.document_scope);
        let retrieval_text = EntityExtractor::retrieval_text(&query);
        let snapshot = self.store.snapshot();

        let vector = stages::embed_query(self.embedder.clone(), &retrieval_text, pipeline.embed_timeout(), pipeline.retry_backoff(), cancel).await?;
        cancel.check()?;
        let (clauses, retrieval) = stages::retrieve(&self.ranker, &snapshot, &retrieval_text, vector.as_deref(), query.document_scope.as_ref());
        cancel.check()?;

        let evaluated = stages::evaluate_rules(self.rules.clone(), query.entities.clone(), clauses.clone(), pipeline.rule_timeout()).await;
        cancel.check()?;

        let (decision, outcomes) = match evaluated {
            Ok(outcomes) => (self.synthesizer.synthesize(&query.entities, &outcomes, &clauses, retrieval), outcomes),
            Err(e) => {
                tracing::warn!(error = %e, "rule evaluation incomplete; decision pending");
                (self.synthesizer.pending_without_rules(&clauses, &e.to_string()), Vec::new())
            }
        };
        let trace = self.traces.record(&query, &decision, &outcomes, &clauses);
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            trace_id = %trace.trace_id,
            status = %decision.status,
            confidence = decision.confidence,
            generation = snapshot.generation,
            elapsed_ms,
            "query answered"
        );
        Ok(QueryResponse::from_trace(&trace, elapsed_ms))
    }

    pub fn trace(&self, trace_id: &str) -> Option<Arc<TraceRecord>> { self.traces.get(trace_id) }

    /// Audit report over the current corpus.
    pub fn audit_report(&self, period: ReportPeriod) -> AuditReport { self.traces.report(period, self.store.snapshot().len()) }
}
