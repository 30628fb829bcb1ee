// Two-stage retrieval: embed → vector search → (optional) cross-encoder rerank
use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use super::candidate::Candidate;
use super::{Retriever, RetrieverInfo};
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::errors::{PipelineStage, Result, RetrievalError};
use crate::rerank::Reranker;
use crate::telemetry::{RetrievalTelemetry, TelemetryEvent};
use crate::vector_store::VectorStore;

/// Results returned by `retrieve` when the caller does not say
pub const DEFAULT_TOP_K: usize = 5;

/// Stage-1 pool size used by `retrieve` regardless of `top_k`
pub const DEFAULT_CANDIDATE_POOL: usize = 20;

/// Where to search and how wide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub collection: String,
    pub candidate_pool: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            collection: "cloud_cost_optimization".to_string(),
            candidate_pool: DEFAULT_CANDIDATE_POOL,
        }
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            collection: config.store.collection.clone(),
            candidate_pool: config.retrieval.candidate_pool,
        }
    }
}

/// Retrieval pipeline over injected embedding, store and reranker backends
pub struct RetrievalPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    reranker: Arc<dyn Reranker>,
    settings: PipelineSettings,
    telemetry: Option<RetrievalTelemetry>,
}

pub(crate) fn require_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(RetrievalError::InvalidArgument(
            "query must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn require_positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(RetrievalError::InvalidArgument(format!(
            "{} must be at least 1",
            name
        )));
    }
    Ok(())
}

/// Descending by rerank score; NaN and unscored candidates sink to the end
fn by_rerank_score(a: &Candidate, b: &Candidate) -> Ordering {
    let a = a.rerank_score.unwrap_or(f32::NAN);
    let b = b.rerank_score.unwrap_or(f32::NAN);
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

impl RetrievalPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        reranker: Arc<dyn Reranker>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        require_positive("candidate_pool", settings.candidate_pool)?;
        if settings.collection.trim().is_empty() {
            return Err(RetrievalError::InvalidArgument(
                "collection must not be empty".to_string(),
            ));
        }

        Ok(Self {
            embedder,
            store,
            reranker,
            settings,
            telemetry: None,
        })
    }

    /// Record stage latencies into a shared collector
    pub fn with_telemetry(mut self, telemetry: RetrievalTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model()
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    pub fn reranker_model(&self) -> &str {
        self.reranker.model()
    }

    /// Compare the embedder's vector length with the collection's
    pub async fn check_dimensions(&self) -> Result<()> {
        let expected = self.embedder.dimension();
        match self.store.dimension(&self.settings.collection).await? {
            Some(actual) if actual != expected => Err(RetrievalError::ConfigError(format!(
                "{} produces {}-dimensional vectors but collection {} holds {}",
                self.embedder.model(),
                expected,
                self.settings.collection,
                actual
            ))),
            _ => Ok(()),
        }
    }

    fn record_stage(&self, stage: PipelineStage, started: Instant, items: usize) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.stage(stage, started, items);
        }
    }

    /// Stage 1: up to `k` candidates in the store's own order
    #[instrument(skip(self), fields(collection = %self.settings.collection))]
    pub async fn semantic_search(&self, query: &str, k: usize) -> Result<Vec<Candidate>> {
        require_query(query)?;
        require_positive("k", k)?;

        let started = Instant::now();
        let vector = self.embedder.embed(query).await?;
        if vector.len() != self.embedder.dimension() {
            return Err(RetrievalError::EmbeddingFailure(format!(
                "{} returned {} dimensions, expected {}",
                self.embedder.model(),
                vector.len(),
                self.embedder.dimension()
            )));
        }
        self.record_stage(PipelineStage::Embedding, started, 1);

        let started = Instant::now();
        let hits = self
            .store
            .search(&self.settings.collection, &vector, k)
            .await?;
        self.record_stage(PipelineStage::Store, started, hits.len());

        debug!(hits = hits.len(), store = self.store.name(), "semantic search complete");

        Ok(hits.into_iter().take(k).map(Candidate::from).collect())
    }

    /// Stage 2: score every candidate against the query and keep the best `top_k`
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn rerank(
        &self,
        query: &str,
        mut candidates: Vec<Candidate>,
        top_k: usize,
    ) -> Result<Vec<Candidate>> {
        require_positive("top_k", top_k)?;

        if candidates.is_empty() {
            return Ok(candidates);
        }

        let started = Instant::now();
        let passages: Vec<&str> = candidates.iter().map(|c| c.content.as_str()).collect();
        let scores = self.reranker.score(query, &passages).await?;
        let scored = candidates.len();

        if scores.len() != candidates.len() {
            return Err(RetrievalError::RerankFailure(format!(
                "reranker returned {} scores for {} candidates",
                scores.len(),
                candidates.len()
            )));
        }

        if scores.iter().any(|s| s.is_nan()) {
            warn!(model = self.reranker.model(), "reranker produced NaN scores");
        }

        for (candidate, score) in candidates.iter_mut().zip(scores) {
            candidate.rerank_score = Some(score);
        }

        // sort_by is stable: ties keep stage-1 rank
        candidates.sort_by(by_rerank_score);
        candidates.truncate(top_k);

        self.record_stage(PipelineStage::Rerank, started, scored);
        debug!(kept = candidates.len(), "rerank complete");

        Ok(candidates)
    }

    /// Full pipeline: always fetch the configured pool, then rerank or cut
    #[instrument(skip(self))]
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        use_reranking: bool,
    ) -> Result<Vec<Candidate>> {
        let started = Instant::now();
        let outcome = self.run(query, top_k, use_reranking).await;

        if let Err(err) = &outcome {
            warn!(stage = err.stage().as_str(), error = %err, "retrieval failed");
        }

        if let Some(telemetry) = &self.telemetry {
            match &outcome {
                Ok(results) => telemetry.record(TelemetryEvent::RetrievalCompleted {
                    duration: started.elapsed(),
                    results: results.len(),
                    reranked: use_reranking,
                    timestamp: Instant::now(),
                }),
                Err(err) => telemetry.record(TelemetryEvent::RetrievalFailed {
                    stage: err.stage(),
                    timestamp: Instant::now(),
                }),
            }
        }

        outcome
    }

    /// `retrieve` with five results and reranking on
    pub async fn retrieve_default(&self, query: &str) -> Result<Vec<Candidate>> {
        self.retrieve(query, DEFAULT_TOP_K, true).await
    }

    async fn run(&self, query: &str, top_k: usize, use_reranking: bool) -> Result<Vec<Candidate>> {
        require_query(query)?;
        require_positive("top_k", top_k)?;

        let mut candidates = self
            .semantic_search(query, self.settings.candidate_pool)
            .await?;

        if !use_reranking {
            candidates.truncate(top_k);
            return Ok(candidates);
        }

        self.rerank(query, candidates, top_k).await
    }
}

#[async_trait]
impl Retriever for RetrievalPipeline {
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        use_reranking: bool,
    ) -> Result<Vec<Candidate>> {
        RetrievalPipeline::retrieve(self, query, top_k, use_reranking).await
    }

    async fn indexed_chunks(&self) -> Result<u64> {
        self.store.count(&self.settings.collection).await
    }

    async fn providers(&self) -> Result<Vec<String>> {
        self.store
            .distinct_values(&self.settings.collection, "provider")
            .await
    }

    fn describe(&self) -> RetrieverInfo {
        RetrieverInfo {
            embedding_model: self.embedder.model().to_string(),
            embedding_dimension: self.embedder.dimension(),
            vector_store: self.store.name().to_string(),
            reranker_model: self.reranker.model().to_string(),
            collection: self.settings.collection.clone(),
        }
    }
}
