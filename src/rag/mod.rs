// Two-stage retrieval over the cloud-cost knowledge base
//
// Components:
// - Candidate: a retrieved chunk with its stage-1 and stage-2 scores
// - Pipeline: semantic search, cross-encoder rerank, top-k selection
// - Context: formatting retrieved chunks for downstream prompts
// - Builder: wiring concrete backends from configuration

pub mod builder;
pub mod candidate;
pub mod context;
pub mod pipeline;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

// Re-export key types
pub use builder::build_pipeline;
pub use candidate::{Candidate, Metadata};
pub use context::{ContextBuilder, ContextConfig};
pub use pipeline::{PipelineSettings, RetrievalPipeline, DEFAULT_CANDIDATE_POOL, DEFAULT_TOP_K};

/// Backends and collection a retriever runs against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieverInfo {
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub vector_store: String,
    pub reranker_model: String,
    pub collection: String,
}

impl Default for RetrieverInfo {
    fn default() -> Self {
        Self {
            embedding_model: "unknown".to_string(),
            embedding_dimension: 0,
            vector_store: "unknown".to_string(),
            reranker_model: "unknown".to_string(),
            collection: "unknown".to_string(),
        }
    }
}

/// Anything that answers ranked queries over the knowledge base.
///
/// The evaluator, the query handler and the agent tool only depend on this
/// trait, so they can be driven by the real pipeline or by a test double.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Ranked candidates for `query`, at most `top_k` of them
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        use_reranking: bool,
    ) -> Result<Vec<Candidate>>;

    /// Size of the searched collection
    async fn indexed_chunks(&self) -> Result<u64>;

    /// Distinct provider tags present in the collection
    async fn providers(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn describe(&self) -> RetrieverInfo {
        RetrieverInfo::default()
    }
}
