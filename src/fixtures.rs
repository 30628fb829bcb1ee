//! Deterministic offline backends and a small cloud-cost corpus.
//!
//! Compiled for unit tests and behind the `fixtures` feature for the
//! integration tests, so default builds do not ship them.
//!
//! - [`HashEmbedder`]: feature-hashed bag of words, unit length
//! - [`KeywordReranker`]: fraction of query terms found in the passage
//! - [`ScriptedReranker`]: returns whatever scores it was given
//! - [`FixedRetriever`]: returns a fixed ranked id list
//! - [`Unavailable`]: every backend call fails with its stage's error

use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::embedding::{normalize, EmbeddingProvider};
use crate::errors::{Result, RetrievalError};
use crate::rag::{Candidate, Metadata, PipelineSettings, RetrievalPipeline, Retriever};
use crate::rerank::Reranker;
use crate::vector_store::{Document, MemoryStore, ScoreOrder, ScoredDocument, VectorStore};

pub const SAMPLE_COLLECTION: &str = "cloud_cost_optimization";

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "can", "do", "does", "for", "how", "i", "in", "is", "my", "of", "on",
    "the", "to", "what", "with",
];

/// Lowercased alphanumeric terms, stop words removed
pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Bag-of-words embedder hashing each term into a fixed number of buckets
pub struct HashEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed` calls served
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model(&self) -> &str {
        "hash-bow"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut vector = vec![0.0; self.dimension];
        for term in terms(text) {
            let bucket = (fnv1a(term.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        normalize(&mut vector);
        Ok(vector)
    }
}

/// Scores a passage by the share of distinct query terms it contains
#[derive(Default)]
pub struct KeywordReranker {
    calls: AtomicUsize,
}

impl KeywordReranker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches scored
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reranker for KeywordReranker {
    fn model(&self) -> &str {
        "keyword-overlap"
    }

    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let query_terms: HashSet<String> = terms(query).into_iter().collect();
        if query_terms.is_empty() {
            return Ok(vec![0.0; passages.len()]);
        }

        Ok(passages
            .iter()
            .map(|passage| {
                let passage_terms: HashSet<String> = terms(passage).into_iter().collect();
                let hits = query_terms.intersection(&passage_terms).count();
                hits as f32 / query_terms.len() as f32
            })
            .collect())
    }
}

enum Script {
    Fixed(Vec<f32>),
    Constant(f32),
}

/// Reranker returning preset scores, for ordering and failure tests
pub struct ScriptedReranker {
    script: Script,
}

impl ScriptedReranker {
    /// Always return exactly `scores`, whatever the batch size
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            script: Script::Fixed(scores),
        }
    }

    /// Give every passage the same score
    pub fn constant(score: f32) -> Self {
        Self {
            script: Script::Constant(score),
        }
    }
}

#[async_trait]
impl Reranker for ScriptedReranker {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn score(&self, _query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        Ok(match &self.script {
            Script::Fixed(scores) => scores.clone(),
            Script::Constant(score) => vec![*score; passages.len()],
        })
    }
}

/// Backend that is never reachable
pub struct Unavailable;

#[async_trait]
impl EmbeddingProvider for Unavailable {
    fn model(&self) -> &str {
        "unavailable"
    }

    fn dimension(&self) -> usize {
        0
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RetrievalError::EmbeddingFailure(
            "embedding service unavailable".to_string(),
        ))
    }
}

#[async_trait]
impl VectorStore for Unavailable {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn score_order(&self) -> ScoreOrder {
        ScoreOrder::HigherIsBetter
    }

    async fn search(&self, collection: &str, _vector: &[f32], _k: usize) -> Result<Vec<ScoredDocument>> {
        Err(RetrievalError::StoreFailure(format!(
            "collection {} unreachable",
            collection
        )))
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        Err(RetrievalError::StoreFailure(format!(
            "collection {} unreachable",
            collection
        )))
    }
}

#[async_trait]
impl Reranker for Unavailable {
    fn model(&self) -> &str {
        "unavailable"
    }

    async fn score(&self, _query: &str, _passages: &[&str]) -> Result<Vec<f32>> {
        Err(RetrievalError::RerankFailure(
            "reranker unavailable".to_string(),
        ))
    }
}

/// Retriever that answers every query with the same ranked ids
pub struct FixedRetriever {
    ranked_ids: Vec<String>,
    calls: AtomicUsize,
}

impl FixedRetriever {
    pub fn new<S: Into<String>>(ranked_ids: impl IntoIterator<Item = S>) -> Self {
        Self {
            ranked_ids: ranked_ids.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `retrieve` calls served
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for FixedRetriever {
    async fn retrieve(
        &self,
        _query: &str,
        top_k: usize,
        use_reranking: bool,
    ) -> Result<Vec<Candidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let total = self.ranked_ids.len();
        Ok(self
            .ranked_ids
            .iter()
            .take(top_k)
            .enumerate()
            .map(|(rank, id)| {
                let mut map = Map::new();
                map.insert("id".to_string(), JsonValue::String(id.clone()));
                Candidate {
                    content: format!("chunk {}", id),
                    metadata: Metadata::new(map),
                    similarity_score: 1.0 - rank as f32 / total.max(1) as f32,
                    rerank_score: use_reranking.then(|| (total - rank) as f32),
                }
            })
            .collect())
    }

    async fn indexed_chunks(&self) -> Result<u64> {
        Ok(self.ranked_ids.len() as u64)
    }
}

/// One chunk of the sample knowledge base
#[derive(Debug, Clone)]
pub struct SampleDoc {
    pub id: &'static str,
    pub provider: &'static str,
    pub source: &'static str,
    pub url: &'static str,
    pub content: &'static str,
}

impl SampleDoc {
    pub fn to_document(&self) -> Document {
        let metadata = json!({
            "id": self.id,
            "provider": self.provider,
            "source": self.source,
            "url": self.url,
        });
        let map = match metadata {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        Document::new(self.content, map)
    }
}

/// Eight chunks across AWS, Azure and GCP
pub fn sample_corpus() -> Vec<SampleDoc> {
    vec![
        SampleDoc {
            id: "aws-1",
            provider: "AWS",
            source: "Amazon S3 cost optimization",
            url: "https://aws.amazon.com/s3/cost-optimization/",
            content: "Reduce S3 storage costs with lifecycle policies that transition objects to S3 Glacier, and enable S3 Intelligent-Tiering for data with unknown access patterns.",
        },
        SampleDoc {
            id: "azure-1",
            provider: "Azure",
            source: "Azure Blob Storage access tiers",
            url: "https://learn.microsoft.com/azure/storage/blobs/access-tiers-overview",
            content: "Move rarely read Azure blobs to the Cool or Archive access tier and use lifecycle management policies to reduce Blob storage costs.",
        },
        SampleDoc {
            id: "gcp-1",
            provider: "GCP",
            source: "BigQuery storage pricing",
            url: "https://cloud.google.com/bigquery/pricing",
            content: "BigQuery long-term storage pricing halves the price of tables not modified for 90 days; partition and cluster tables to scan less data.",
        },
        SampleDoc {
            id: "aws-2",
            provider: "AWS",
            source: "Amazon EC2 rightsizing",
            url: "https://aws.amazon.com/ec2/cost-and-capacity/",
            content: "Rightsize EC2 instances using Compute Optimizer recommendations and buy Savings Plans to reduce compute costs.",
        },
        SampleDoc {
            id: "azure-2",
            provider: "Azure",
            source: "Azure Spot Virtual Machines",
            url: "https://azure.microsoft.com/products/virtual-machines/spot/",
            content: "Azure Spot VMs run interruptible workloads at up to 90% discount compared to pay-as-you-go prices.",
        },
        SampleDoc {
            id: "gcp-2",
            provider: "GCP",
            source: "Compute Engine committed use discounts",
            url: "https://cloud.google.com/compute/docs/instances/committed-use-discounts-overview",
            content: "Committed use discounts and sustained use discounts lower Compute Engine costs for predictable workloads.",
        },
        SampleDoc {
            id: "aws-3",
            provider: "AWS",
            source: "S3 Intelligent-Tiering",
            url: "https://aws.amazon.com/s3/storage-classes/intelligent-tiering/",
            content: "S3 Intelligent-Tiering automatically moves objects between access tiers when access patterns change, with no retrieval fees.",
        },
        SampleDoc {
            id: "gcp-3",
            provider: "GCP",
            source: "Cloud Storage classes",
            url: "https://cloud.google.com/storage/docs/storage-classes",
            content: "Nearline, Coldline and Archive classes cut Cloud Storage spend for data read less than once a month.",
        },
    ]
}

/// Memory store holding `docs` in [`SAMPLE_COLLECTION`], embedded with `embedder`
pub async fn store_with(embedder: &dyn EmbeddingProvider, docs: &[SampleDoc]) -> Result<MemoryStore> {
    let store = MemoryStore::new();
    let documents = docs.iter().map(SampleDoc::to_document).collect();
    store.index(SAMPLE_COLLECTION, embedder, documents).await?;
    Ok(store)
}

/// Memory store holding the whole sample corpus
pub async fn seeded_store(embedder: &dyn EmbeddingProvider) -> Result<MemoryStore> {
    store_with(embedder, &sample_corpus()).await
}

/// Offline pipeline over the sample corpus with hash embeddings and keyword reranking
pub async fn sample_pipeline() -> Result<RetrievalPipeline> {
    let embedder = Arc::new(HashEmbedder::default());
    let store = seeded_store(embedder.as_ref()).await?;
    RetrievalPipeline::new(
        embedder,
        Arc::new(store),
        Arc::new(KeywordReranker::new()),
        PipelineSettings {
            collection: SAMPLE_COLLECTION.to_string(),
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms_drop_stop_words() {
        assert_eq!(
            terms("How do I reduce S3 storage costs?"),
            vec!["reduce", "s3", "storage", "costs"]
        );
    }

    #[tokio::test]
    async fn test_hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(32);
        let a = embedder.embed("S3 lifecycle").await.unwrap();
        let b = embedder.embed("s3   LIFECYCLE").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_keyword_reranker_overlap() {
        let reranker = KeywordReranker::new();
        let scores = reranker
            .score("reduce storage costs", &["storage costs here", "nothing"])
            .await
            .unwrap();
        assert!((scores[0] - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(scores[1], 0.0);
    }

    #[tokio::test]
    async fn test_fixed_retriever_truncates() {
        let retriever = FixedRetriever::new(["a", "b", "c"]);
        let out = retriever.retrieve("q", 2, true).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].metadata.id().as_deref(), Some("b"));
        assert_eq!(retriever.calls(), 1);
    }

    #[tokio::test]
    async fn test_sample_corpus_ids_unique() {
        let ids: HashSet<_> = sample_corpus().iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), sample_corpus().len());
        let store = seeded_store(&HashEmbedder::default()).await.unwrap();
        assert_eq!(store.count(SAMPLE_COLLECTION).await.unwrap(), 8);
    }
}
