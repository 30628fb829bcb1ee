//! finops-retrieval - Two-stage retrieval for cloud cost optimization
//!
//! Answers natural-language questions about AWS, Azure and GCP cost
//! optimization with passages from an indexed knowledge base.
//!
//! # Architecture
//!
//! - **Stage 1**: query embedding + k-NN search over the vector store
//! - **Stage 2**: cross-encoder reranking of the candidate pool
//! - **Evaluation**: Recall@K and MRR against relevance judgments
//! - **Adapters**: query handler and agent tool over the `Retriever` trait

// Core
pub mod errors;
pub mod config;
pub mod embedding;
pub mod vector_store;
pub mod rerank;
pub mod rag;
pub mod evaluation;

// Re-export commonly used types
pub use config::Config;
pub use errors::{PipelineStage, Result, RetrievalError};
pub use rag::{build_pipeline, Candidate, Metadata, RetrievalPipeline, Retriever};

// Interface layer
pub mod integration;
pub mod telemetry;
pub mod cli;

// Offline backends and sample corpus for tests
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
