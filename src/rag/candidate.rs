// Retrieved chunk carried through both pipeline stages
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::vector_store::ScoredDocument;

/// Origin metadata of a chunk, kept exactly as the store returned it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, JsonValue>);

impl Metadata {
    pub fn new(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    /// Human-readable origin (page title, document name)
    pub fn source(&self) -> &str {
        self.text("source").unwrap_or_default()
    }

    /// Cloud provider tag (AWS, Azure, GCP, ...)
    pub fn provider(&self) -> &str {
        self.text("provider").unwrap_or_default()
    }

    pub fn url(&self) -> &str {
        self.text("url").unwrap_or_default()
    }

    /// Stable identifier used for relevance judging, stringified
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// `id()` with a missing id mapped to the empty string
    pub fn id_or_empty(&self) -> String {
        self.id().unwrap_or_default()
    }
}

/// A document fragment under consideration for a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub content: String,
    pub metadata: Metadata,
    /// Raw stage-1 score, meaningful only under the store's own convention
    pub similarity_score: f32,
    /// Stage-2 score; higher is more relevant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl From<ScoredDocument> for Candidate {
    fn from(hit: ScoredDocument) -> Self {
        Self {
            content: hit.document.content,
            metadata: Metadata::new(hit.document.metadata),
            similarity_score: hit.score,
            rerank_score: None,
        }
    }
}
