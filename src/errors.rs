//! Error types for the retrieval pipeline
//!
//! Every failure that reaches a caller of `retrieve`, `recall_at_k` or
//! `mean_reciprocal_rank` is classified by the stage that produced it.

use thiserror::Error;

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Argument checks performed before any external call
    Validation,
    /// Query embedding
    Embedding,
    /// Vector store search
    Store,
    /// Cross-encoder scoring
    Rerank,
    /// Configuration, I/O and serialization outside the pipeline
    Other,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Embedding => "embedding",
            Self::Store => "store",
            Self::Rerank => "rerank",
            Self::Other => "other",
        }
    }
}

/// Main error type for retrieval and evaluation
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The query could not be embedded
    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    /// Vector store search failed or the collection is unreachable
    #[error("Vector store failed: {0}")]
    StoreFailure(String),

    /// The reranker failed while scoring the candidate batch
    #[error("Reranking failed: {0}")]
    RerankFailure(String),

    /// Rejected before any external call was made
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl RetrievalError {
    /// Stage that produced this error
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::EmbeddingFailure(_) => PipelineStage::Embedding,
            Self::StoreFailure(_) => PipelineStage::Store,
            Self::RerankFailure(_) => PipelineStage::Rerank,
            Self::InvalidArgument(_) => PipelineStage::Validation,
            Self::ConfigError(_) | Self::IoError(_) | Self::SerializationError(_) => {
                PipelineStage::Other
            }
        }
    }

    /// True for failures of an external collaborator (embedder, store, reranker)
    pub fn is_external(&self) -> bool {
        matches!(
            self.stage(),
            PipelineStage::Embedding | PipelineStage::Store | PipelineStage::Rerank
        )
    }

    pub(crate) fn embedding(err: impl std::fmt::Display) -> Self {
        Self::EmbeddingFailure(err.to_string())
    }

    pub(crate) fn store(err: impl std::fmt::Display) -> Self {
        Self::StoreFailure(err.to_string())
    }

    pub(crate) fn rerank(err: impl std::fmt::Display) -> Self {
        Self::RerankFailure(err.to_string())
    }
}

/// Result type alias for retrieval operations
pub type Result<T> = std::result::Result<T, RetrievalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RetrievalError::StoreFailure("collection missing".to_string());
        assert!(err.to_string().contains("collection missing"));
        assert!(err.to_string().starts_with("Vector store failed"));
    }

    #[test]
    fn test_stage_classification() {
        assert_eq!(
            RetrievalError::EmbeddingFailure("x".into()).stage(),
            PipelineStage::Embedding
        );
        assert_eq!(
            RetrievalError::RerankFailure("x".into()).stage(),
            PipelineStage::Rerank
        );
        assert_eq!(
            RetrievalError::InvalidArgument("x".into()).stage(),
            PipelineStage::Validation
        );
        assert_eq!(
            RetrievalError::ConfigError("x".into()).stage(),
            PipelineStage::Other
        );
    }

    #[test]
    fn test_stage_names() {
        let names: Vec<&str> = [
            PipelineStage::Validation,
            PipelineStage::Embedding,
            PipelineStage::Store,
            PipelineStage::Rerank,
            PipelineStage::Other,
        ]
        .iter()
        .map(PipelineStage::as_str)
        .collect();
        assert_eq!(names, ["validation", "embedding", "store", "rerank", "other"]);
    }

    #[test]
    fn test_is_external() {
        assert!(RetrievalError::store("down").is_external());
        assert!(!RetrievalError::InvalidArgument("empty".into()).is_external());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RetrievalError = io.into();
        assert_eq!(err.stage(), PipelineStage::Other);
    }
}
