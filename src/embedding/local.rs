// Local sentence embeddings via a BERT encoder run through candle
use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use serde::Deserialize;
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationParams};

use super::{normalize, EmbeddingProvider};
use crate::errors::{Result, RetrievalError};

pub const DEFAULT_LOCAL_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
const MAX_SEQUENCE_LENGTH: usize = 256;

#[derive(Deserialize)]
struct HiddenSize {
    hidden_size: usize,
}

struct Encoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

/// Embedding provider using a sentence-transformers BERT model via Candle
pub struct LocalEmbedder {
    encoder: Arc<Encoder>,
    model_id: String,
    dimension: usize,
}

impl LocalEmbedder {
    /// Create new embedder (downloads model on first use)
    pub fn new(model_id: &str) -> Result<Self> {
        Self::load(model_id).map_err(RetrievalError::embedding)
    }

    fn load(model_id: &str) -> AnyResult<Self> {
        let device = Device::Cpu;

        let api = Api::new().context("Failed to create HuggingFace API client")?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .context("Failed to download model config")?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .context("Failed to download tokenizer")?;
        let weights_path = repo
            .get("model.safetensors")
            .context("Failed to download model weights")?;

        let config_contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&config_contents).context("Failed to parse model config")?;
        let HiddenSize { hidden_size } =
            serde_json::from_str(&config_contents).context("Model config has no hidden_size")?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], candle_core::DType::F32, &device)
                .context("Failed to load model weights")?
        };
        let model = BertModel::load(vb, &config).context("Failed to create BERT model")?;

        tracing::info!(model = model_id, dimension = hidden_size, "local embedding model loaded");

        Ok(Self {
            encoder: Arc::new(Encoder {
                model,
                tokenizer,
                device,
            }),
            model_id: model_id.to_string(),
            dimension: hidden_size,
        })
    }
}

impl Encoder {
    fn encode(&self, text: &str) -> AnyResult<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let ids = encoding.get_ids().to_vec();
        let type_ids = encoding.get_type_ids().to_vec();
        let mask = encoding.get_attention_mask().to_vec();
        let len = ids.len();

        let token_ids = Tensor::from_vec(ids, (1, len), &self.device)?;
        let token_type_ids = Tensor::from_vec(type_ids, (1, len), &self.device)?;
        let attention_mask = Tensor::from_vec(mask, (1, len), &self.device)?;

        let hidden = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = mean_pool(&hidden, &attention_mask)?;

        let mut vector = pooled.squeeze(0)?.to_vec1::<f32>()?;
        normalize(&mut vector);
        Ok(vector)
    }
}

/// Mean pooling with attention mask
fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> AnyResult<Tensor> {
    let mask_expanded = attention_mask
        .unsqueeze(2)?
        .expand(embeddings.shape())?
        .to_dtype(embeddings.dtype())?;

    let sum_embeddings = (embeddings * &mask_expanded)?.sum(1)?;
    let sum_mask = mask_expanded.sum(1)?.clamp(1e-9, f64::MAX)?;

    Ok(sum_embeddings.broadcast_div(&sum_mask)?)
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    fn model(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoder = Arc::clone(&self.encoder);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || encoder.encode(&text))
            .await
            .map_err(RetrievalError::embedding)?
            .map_err(RetrievalError::embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Integration test - requires model download
    async fn test_embedding_dimension() {
        let embedder = LocalEmbedder::new(DEFAULT_LOCAL_MODEL).expect("Failed to create embedder");
        assert_eq!(embedder.dimension(), 384);
        let vector = embedder.embed("S3 lifecycle policies").await.unwrap();
        assert_eq!(vector.len(), 384);
    }

    #[tokio::test]
    #[ignore] // Integration test - requires model download
    async fn test_embedding_is_normalized() {
        let embedder = LocalEmbedder::new(DEFAULT_LOCAL_MODEL).expect("Failed to create embedder");
        let vector = embedder.embed("Azure reserved instances").await.unwrap();
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_mean_pool_ignores_padding() {
        let device = Device::Cpu;
        let embeddings =
            Tensor::from_vec(vec![1.0f32, 1.0, 3.0, 3.0, 100.0, 100.0], (1, 3, 2), &device)
                .unwrap();
        let mask = Tensor::from_vec(vec![1u32, 1, 0], (1, 3), &device).unwrap();
        let pooled = mean_pool(&embeddings, &mask).unwrap();
        let values = pooled.squeeze(0).unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(values, vec![2.0, 2.0]);
    }
}
