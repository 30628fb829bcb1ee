//! Rerankers
//!
//! Second-stage relevance scoring. A reranker sees the query and each
//! candidate passage jointly and returns one score per passage, in input
//! order. Higher is always more relevant.
//!
//! ```ascii
//!                 ┌─────────────────┐
//!                 │  Reranker trait │
//!                 └────────┬────────┘
//!              ┌───────────┴───────────┐
//!              ▼                       ▼
//!   ┌──────────────────────┐  ┌────────────────┐
//!   │ CrossEncoderReranker │  │  HttpReranker  │
//!   │ (candle, local)      │  │ (Jina/Cohere)  │
//!   └──────────────────────┘  └────────────────┘
//! ```

pub mod cross_encoder;
pub mod http;

use async_trait::async_trait;

use crate::errors::Result;

pub use cross_encoder::CrossEncoderReranker;
pub use http::HttpReranker;

/// Pairwise (query, passage) relevance scorer
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Model identifier
    fn model(&self) -> &str;

    /// Score every passage against the query.
    ///
    /// The returned vector has exactly one score per passage, in the same
    /// order as `passages`. Failures are `RerankFailure`.
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>>;
}

/// Logistic squashing applied to raw cross-encoder logits
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_monotonic() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(-3.0) < sigmoid(0.5));
        assert!(sigmoid(8.0) > 0.99);
    }

    #[test]
    fn test_reranker_trait_is_object_safe() {
        fn _accepts_dyn(_r: &dyn Reranker) {}
    }
}
