//! Query surface types
//!
//! Request/response shapes for serving the pipeline behind an HTTP layer.
//! No server lives here: a transport deserializes a [`QueryRequest`], calls
//! [`QueryHandler::handle`] and serializes the [`QueryResponse`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::errors::{Result, RetrievalError};
use crate::rag::{Candidate, Retriever};

/// Largest `top_k` a request may ask for
pub const MAX_TOP_K: usize = 20;

/// Provider filter entry that disables filtering (auto-generated API docs send it)
const PLACEHOLDER_PROVIDER: &str = "string";

fn default_top_k() -> usize {
    5
}

fn default_use_reranking() -> bool {
    true
}

/// Incoming query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_use_reranking")]
    pub use_reranking: bool,
    #[serde(default)]
    pub provider_filter: Option<Vec<String>>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: default_top_k(),
            use_reranking: default_use_reranking(),
            provider_filter: None,
        }
    }

    /// Reject requests the pipeline would not accept
    pub fn validate(&self) -> Result<()> {
        if self.query.is_empty() {
            return Err(RetrievalError::InvalidArgument(
                "query must not be empty".to_string(),
            ));
        }
        if !(1..=MAX_TOP_K).contains(&self.top_k) {
            return Err(RetrievalError::InvalidArgument(format!(
                "top_k must be between 1 and {}, got {}",
                MAX_TOP_K, self.top_k
            )));
        }
        Ok(())
    }

    /// Lowercased providers to keep, or `None` when no filtering applies
    fn active_filter(&self) -> Option<Vec<String>> {
        let filter = self.provider_filter.as_ref()?;
        if filter.is_empty() || filter.iter().any(|p| p == PLACEHOLDER_PROVIDER) {
            return None;
        }
        Some(filter.iter().map(|p| p.to_lowercase()).collect())
    }
}

/// One result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub content: String,
    pub source: String,
    pub provider: String,
    pub url: String,
    /// Raw stage-1 score
    pub confidence_score: f32,
    pub rerank_score: Option<f32>,
}

impl From<Candidate> for QueryResult {
    fn from(candidate: Candidate) -> Self {
        Self {
            source: candidate.metadata.source().to_string(),
            provider: candidate.metadata.provider().to_string(),
            url: candidate.metadata.url().to_string(),
            content: candidate.content,
            confidence_score: candidate.similarity_score,
            rerank_score: candidate.rerank_score,
        }
    }
}

/// Answer to a [`QueryRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub results: Vec<QueryResult>,
    pub total_results: usize,
    pub processing_time_ms: f64,
}

/// Liveness report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "healthy" or "degraded"
    pub status: String,
    pub pipeline_ready: bool,
    pub indexed_chunks: Option<u64>,
}

/// Knowledge base summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_chunks: u64,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    /// Distinct provider tags in the collection, sorted
    pub providers: Vec<String>,
    pub vector_db_type: String,
    pub reranker_model: String,
    pub collection: String,
}

/// Serves query requests from a shared retriever
pub struct QueryHandler {
    retriever: Arc<dyn Retriever>,
}

impl QueryHandler {
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self { retriever }
    }

    /// Run the query; the provider filter is applied after ranking, so fewer
    /// than `top_k` results may come back
    pub async fn handle(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let started = Instant::now();
        request.validate()?;

        let mut results = self
            .retriever
            .retrieve(&request.query, request.top_k, request.use_reranking)
            .await?;

        if let Some(providers) = request.active_filter() {
            let before = results.len();
            results.retain(|c| providers.contains(&c.metadata.provider().to_lowercase()));
            debug!(before, after = results.len(), "provider filter applied");
        }

        let results: Vec<QueryResult> = results.into_iter().map(QueryResult::from).collect();
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        Ok(QueryResponse {
            query: request.query.clone(),
            total_results: results.len(),
            results,
            processing_time_ms: (elapsed_ms * 100.0).round() / 100.0,
        })
    }

    /// Collection size, provider tags and the backends in use
    pub async fn stats(&self) -> Result<SystemStats> {
        let total_chunks = self.retriever.indexed_chunks().await?;
        let providers = self.retriever.providers().await?;
        let info = self.retriever.describe();

        Ok(SystemStats {
            total_chunks,
            embedding_model: info.embedding_model,
            embedding_dimension: info.embedding_dimension,
            providers,
            vector_db_type: info.vector_store,
            reranker_model: info.reranker_model,
            collection: info.collection,
        })
    }

    /// Check the store behind the retriever; never fails
    pub async fn health(&self) -> HealthStatus {
        match self.retriever.indexed_chunks().await {
            Ok(count) => HealthStatus {
                status: "healthy".to_string(),
                pipeline_ready: true,
                indexed_chunks: Some(count),
            },
            Err(err) => {
                warn!(error = %err, "health check failed");
                HealthStatus {
                    status: "degraded".to_string(),
                    pipeline_ready: false,
                    indexed_chunks: None,
                }
            }
        }
    }
}
