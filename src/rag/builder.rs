// Wires concrete embedding, store and reranker backends from configuration
use std::sync::Arc;
use tracing::{info, warn};

use super::pipeline::{PipelineSettings, RetrievalPipeline};
use crate::config::{Config, EmbeddingBackend, RerankerBackend, StoreBackend};
use crate::embedding::local::DEFAULT_LOCAL_MODEL;
use crate::embedding::openai::known_dimension;
use crate::embedding::{EmbeddingProvider, LocalEmbedder, OpenAiEmbedder};
use crate::errors::{Result, RetrievalError};
use crate::rerank::{CrossEncoderReranker, HttpReranker, Reranker};
use crate::vector_store::memory::load_seed_file;
use crate::vector_store::{MemoryStore, QdrantStore, VectorStore};

/// Model to load for the local backend; hosted model names fall back to the default encoder
fn local_model_id(configured: &str) -> &str {
    if known_dimension(configured).is_some() {
        DEFAULT_LOCAL_MODEL
    } else {
        configured
    }
}

async fn build_embedder(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding.backend {
        EmbeddingBackend::Openai => Ok(Arc::new(OpenAiEmbedder::new(&config.embedding)?)),
        EmbeddingBackend::Local => {
            let model_id = local_model_id(&config.embedding.model).to_string();
            // hf-hub download and weight mmap are blocking
            let embedder = tokio::task::spawn_blocking(move || LocalEmbedder::new(&model_id))
                .await
                .map_err(RetrievalError::embedding)??;
            Ok(Arc::new(embedder))
        }
    }
}

async fn build_store(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
) -> Result<Arc<dyn VectorStore>> {
    match config.store.backend {
        StoreBackend::Qdrant => Ok(Arc::new(QdrantStore::new(&config.store)?)),
        StoreBackend::Memory => {
            let collection = &config.store.collection;
            let store = MemoryStore::with_collection(collection).await;
            match &config.store.seed_file {
                Some(path) => {
                    let documents = load_seed_file(path)?;
                    let indexed = store.index(collection, embedder, documents).await?;
                    info!(indexed, seed_file = %path.display(), "memory store seeded");
                }
                None => warn!(collection = %collection, "memory store has no seed_file; collection is empty"),
            }
            Ok(Arc::new(store))
        }
    }
}

async fn build_reranker(config: &Config) -> Result<Arc<dyn Reranker>> {
    match config.reranker.backend {
        RerankerBackend::Http => Ok(Arc::new(HttpReranker::new(&config.reranker)?)),
        RerankerBackend::CrossEncoder => {
            let model_id = config.reranker.model.clone();
            let max_length = config.reranker.max_length;
            let reranker = tokio::task::spawn_blocking(move || {
                CrossEncoderReranker::new(&model_id, max_length)
            })
            .await
            .map_err(RetrievalError::rerank)??;
            Ok(Arc::new(reranker))
        }
    }
}

/// Construct the pipeline described by `config`
pub async fn build_pipeline(config: &Config) -> Result<RetrievalPipeline> {
    let embedder = build_embedder(config).await?;
    let store = build_store(config, embedder.as_ref()).await?;
    let reranker = build_reranker(config).await?;

    info!(
        embedding = embedder.model(),
        store = store.name(),
        reranker = reranker.model(),
        collection = %config.store.collection,
        "retrieval pipeline ready"
    );

    RetrievalPipeline::new(embedder, store, reranker, PipelineSettings::from(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::HashEmbedder;

    #[test]
    fn test_local_model_id_falls_back_for_hosted_names() {
        assert_eq!(local_model_id("text-embedding-3-small"), DEFAULT_LOCAL_MODEL);
        assert_eq!(
            local_model_id("BAAI/bge-small-en-v1.5"),
            "BAAI/bge-small-en-v1.5"
        );
    }

    #[tokio::test]
    async fn test_memory_store_with_http_backends() {
        let mut config = Config::default();
        config.embedding.api_key = Some("test-key".to_string());
        config.store.backend = StoreBackend::Memory;
        config.reranker.backend = RerankerBackend::Http;

        let pipeline = build_pipeline(&config).await.unwrap();
        assert_eq!(pipeline.store_name(), "memory");
        assert_eq!(pipeline.embedding_model(), "text-embedding-3-small");
        assert_eq!(pipeline.settings().candidate_pool, 20);
    }

    #[tokio::test]
    async fn test_memory_store_seeded_from_file() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        config.store.seed_file =
            Some(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("data/sample_knowledge_base.json"));

        let embedder = HashEmbedder::new(64);
        let store = build_store(&config, &embedder).await.unwrap();
        assert_eq!(store.count(&config.store.collection).await.unwrap(), 9);
        assert_eq!(store.dimension(&config.store.collection).await.unwrap(), Some(64));
        assert_eq!(embedder.calls(), 9);
    }

    #[tokio::test]
    async fn test_memory_store_without_seed_is_empty() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        let store = build_store(&config, &HashEmbedder::default()).await.unwrap();
        assert_eq!(store.count(&config.store.collection).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_seed_file_errors_surface() {
        let mut config = Config::default();
        config.embedding.api_key = Some("test-key".to_string());
        config.store.backend = StoreBackend::Memory;
        config.store.seed_file = Some("/nonexistent/seed.json".into());
        config.reranker.backend = RerankerBackend::Http;

        let err = build_pipeline(&config).await.err().unwrap();
        assert!(matches!(err, RetrievalError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_openai_without_key_is_config_error() {
        let mut config = Config::default();
        config.embedding.api_key = None;
        config.store.backend = StoreBackend::Memory;
        config.reranker.backend = RerankerBackend::Http;

        let err = build_pipeline(&config).await.err().unwrap();
        assert!(matches!(err, RetrievalError::ConfigError(_)));
    }
}
