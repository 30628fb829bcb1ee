// In-process cosine-similarity store for tests and offline runs
use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tokio::sync::RwLock;

use super::{Document, ScoreOrder, ScoredDocument, VectorStore};
use crate::embedding::EmbeddingProvider;
use crate::errors::{Result, RetrievalError};

struct Entry {
    vector: Vec<f32>,
    document: Document,
}

/// Brute-force vector store; collections must be created before they are searched
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with one empty collection
    pub async fn with_collection(name: &str) -> Self {
        let store = Self::new();
        store.create_collection(name).await;
        store
    }

    /// Create an empty collection (no-op if it exists)
    pub async fn create_collection(&self, name: &str) {
        self.collections
            .write()
            .await
            .entry(name.to_string())
            .or_default();
    }

    /// Append a document; creates the collection on first insert
    pub async fn insert(&self, collection: &str, vector: Vec<f32>, document: Document) -> Result<()> {
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_string()).or_default();

        if let Some(first) = entries.first() {
            if first.vector.len() != vector.len() {
                return Err(RetrievalError::StoreFailure(format!(
                    "dimension mismatch in {}: expected {}, got {}",
                    collection,
                    first.vector.len(),
                    vector.len()
                )));
            }
        }

        entries.push(Entry { vector, document });
        Ok(())
    }

    /// Embed each document with `embedder` and append it; returns how many were added
    pub async fn index(
        &self,
        collection: &str,
        embedder: &dyn EmbeddingProvider,
        documents: Vec<Document>,
    ) -> Result<usize> {
        self.create_collection(collection).await;

        let total = documents.len();
        for document in documents {
            let vector = embedder.embed(&document.content).await?;
            if vector.len() != embedder.dimension() {
                return Err(RetrievalError::EmbeddingFailure(format!(
                    "{} returned {} dimensions, expected {}",
                    embedder.model(),
                    vector.len(),
                    embedder.dimension()
                )));
            }
            self.insert(collection, vector, document).await?;
        }

        Ok(total)
    }
}

/// Read a JSON array of flat payload objects, the same shape Qdrant stores:
/// chunk text under `content` (or `document` / `page_content`), everything
/// else kept as metadata
pub fn load_seed_file(path: &Path) -> Result<Vec<Document>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        RetrievalError::ConfigError(format!("Failed to read seed file {}: {}", path.display(), e))
    })?;
    let records: Vec<Map<String, JsonValue>> = serde_json::from_str(&contents)?;

    let documents: Vec<Document> = records.into_iter().map(Document::from_payload).collect();
    if let Some(idx) = documents.iter().position(|d| d.content.trim().is_empty()) {
        return Err(RetrievalError::ConfigError(format!(
            "seed record {} in {} has no content",
            idx,
            path.display()
        )));
    }

    Ok(documents)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn score_order(&self) -> ScoreOrder {
        ScoreOrder::HigherIsBetter
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let collections = self.collections.read().await;
        let entries = collections.get(collection).ok_or_else(|| {
            RetrievalError::StoreFailure(format!("collection not found: {}", collection))
        })?;

        if let Some(first) = entries.first() {
            if first.vector.len() != vector.len() {
                return Err(RetrievalError::StoreFailure(format!(
                    "query has {} dimensions, collection {} has {}",
                    vector.len(),
                    collection,
                    first.vector.len()
                )));
            }
        }

        let mut hits: Vec<ScoredDocument> = entries
            .iter()
            .map(|entry| ScoredDocument {
                document: entry.document.clone(),
                score: cosine_similarity(&entry.vector, vector),
            })
            .collect();

        // Stable: equal scores keep insertion order
        let order = self.score_order();
        hits.sort_by(|a, b| order.compare(a.score, b.score));
        hits.truncate(k);

        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|entries| entries.len() as u64)
            .ok_or_else(|| RetrievalError::StoreFailure(format!("collection not found: {}", collection)))
    }

    async fn dimension(&self, collection: &str) -> Result<Option<usize>> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|entries| entries.first().map(|entry| entry.vector.len()))
            .ok_or_else(|| RetrievalError::StoreFailure(format!("collection not found: {}", collection)))
    }

    async fn distinct_values(&self, collection: &str, key: &str) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        let entries = collections.get(collection).ok_or_else(|| {
            RetrievalError::StoreFailure(format!("collection not found: {}", collection))
        })?;

        let values: BTreeSet<&str> = entries
            .iter()
            .filter_map(|entry| entry.document.metadata.get(key)?.as_str())
            .collect();
        Ok(values.into_iter().map(str::to_string).collect())
    }
}
