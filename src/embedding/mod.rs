//! Embedding providers
//!
//! Maps query text to a dense vector in the same space the knowledge base
//! was indexed with. The pipeline only sees the [`EmbeddingProvider`] trait.

pub mod local;
pub mod openai;

use async_trait::async_trait;

use crate::errors::Result;

pub use local::LocalEmbedder;
pub use openai::OpenAiEmbedder;

/// Text → vector capability
///
/// Implementations must be safe to share across concurrent `retrieve` calls.
/// Failures are reported as [`crate::RetrievalError::EmbeddingFailure`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, for logs and health output
    fn model(&self) -> &str;

    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Scale a vector to unit length in place (no-op for the zero vector)
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
