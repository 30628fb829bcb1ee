//! Vector store capability
//!
//! A store holds `(vector, text, metadata)` tuples in named collections and
//! answers k-nearest-neighbor queries. Raw scores are store-defined: the
//! store reports whether higher or lower means closer through
//! [`VectorStore::score_order`], and results always come back best-first.

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;

use crate::errors::Result;

pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

/// Payload keys that may carry the chunk text
pub const CONTENT_KEYS: [&str; 3] = ["document", "page_content", "content"];

/// Direction of a store's raw score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreOrder {
    /// Similarity (cosine, dot product)
    HigherIsBetter,
    /// Distance (euclidean, cosine distance)
    LowerIsBetter,
}

impl ScoreOrder {
    /// Best-first ordering of two raw scores; NaN ranks last
    pub fn compare(&self, a: f32, b: f32) -> Ordering {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
                match self {
                    Self::HigherIsBetter => ord.reverse(),
                    Self::LowerIsBetter => ord,
                }
            }
        }
    }
}

/// A stored chunk with its payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: Map<String, JsonValue>,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: Map<String, JsonValue>) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Split a flat payload into chunk text and the remaining metadata
    pub fn from_payload(mut payload: Map<String, JsonValue>) -> Self {
        let content = CONTENT_KEYS
            .iter()
            .find_map(|key| match payload.remove(*key) {
                Some(JsonValue::String(text)) => Some(text),
                _ => None,
            })
            .unwrap_or_default();

        Self {
            content,
            metadata: payload,
        }
    }
}

/// One k-NN hit: the document and its raw store score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// k-NN search over a named collection
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name, for logs and health output
    fn name(&self) -> &str;

    /// How to read the raw scores this store returns
    fn score_order(&self) -> ScoreOrder;

    /// Up to `k` nearest documents, best first. An empty collection yields an
    /// empty list; a missing or unreachable collection is a `StoreFailure`.
    async fn search(&self, collection: &str, vector: &[f32], k: usize)
        -> Result<Vec<ScoredDocument>>;

    /// Number of indexed chunks in a collection
    async fn count(&self, collection: &str) -> Result<u64>;

    /// Vector length the collection was built with, when the backend knows it
    async fn dimension(&self, _collection: &str) -> Result<Option<usize>> {
        Ok(None)
    }

    /// Sorted distinct string values of a payload key across the collection
    async fn distinct_values(&self, _collection: &str, _key: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_payload_extracts_document_key() {
        let payload = json!({
            "document": "Use S3 Intelligent-Tiering",
            "provider": "AWS",
            "id": "aws-1"
        });
        let doc = Document::from_payload(payload.as_object().unwrap().clone());
        assert_eq!(doc.content, "Use S3 Intelligent-Tiering");
        assert!(!doc.metadata.contains_key("document"));
        assert_eq!(doc.metadata["provider"], "AWS");
    }

    #[test]
    fn test_from_payload_page_content_fallback() {
        let payload = json!({ "page_content": "Spot VMs", "provider": "Azure" });
        let doc = Document::from_payload(payload.as_object().unwrap().clone());
        assert_eq!(doc.content, "Spot VMs");
    }

    #[test]
    fn test_score_order() {
        assert_eq!(ScoreOrder::HigherIsBetter.compare(0.9, 0.1), Ordering::Less);
        assert_eq!(ScoreOrder::LowerIsBetter.compare(0.1, 0.9), Ordering::Less);
        assert_eq!(ScoreOrder::LowerIsBetter.compare(0.5, 0.5), Ordering::Equal);

        let mut scores = vec![0.2, f32::NAN, 0.7, 0.4];
        scores.sort_by(|a, b| ScoreOrder::LowerIsBetter.compare(*a, *b));
        assert_eq!(&scores[..3], &[0.2, 0.4, 0.7]);
        assert!(scores[3].is_nan());
    }
}
