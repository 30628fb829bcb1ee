// Cross-encoder reranker: BERT encoder + pooler + single-logit classifier via Candle
use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use serde::Deserialize;
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationParams};

use super::{sigmoid, Reranker};
use crate::errors::{Result, RetrievalError};

#[derive(Deserialize)]
struct HeadConfig {
    hidden_size: usize,
}

struct Scorer {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

/// Local cross-encoder (e.g. `cross-encoder/ms-marco-MiniLM-L6-v2`)
pub struct CrossEncoderReranker {
    scorer: Arc<Scorer>,
    model_id: String,
}

impl CrossEncoderReranker {
    /// Create new reranker (downloads model on first use)
    pub fn new(model_id: &str, max_length: usize) -> Result<Self> {
        Self::load(model_id, max_length).map_err(RetrievalError::rerank)
    }

    fn load(model_id: &str, max_length: usize) -> AnyResult<Self> {
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
        let head: HeadConfig =
            serde_json::from_str(&config_contents).context("Model config has no hidden_size")?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .context("Failed to load model weights")?
        };

        let bert = BertModel::load(vb.pp("bert"), &config).context("Failed to create BERT encoder")?;
        let pooler = candle_nn::linear(head.hidden_size, head.hidden_size, vb.pp("bert.pooler.dense"))
            .context("Failed to load pooler")?;
        let classifier = candle_nn::linear(head.hidden_size, 1, vb.pp("classifier"))
            .context("Failed to load classifier head")?;

        tracing::info!(model = model_id, "cross-encoder loaded");

        Ok(Self {
            scorer: Arc::new(Scorer {
                bert,
                pooler,
                classifier,
                tokenizer,
                device,
            }),
            model_id: model_id.to_string(),
        })
    }
}

impl Scorer {
    fn score_pairs(&self, query: &str, passages: &[String]) -> AnyResult<Vec<f32>> {
        let pairs: Vec<(String, String)> = passages
            .iter()
            .map(|p| (query.to_string(), p.clone()))
            .collect();

        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let batch_size = encodings.len();

        let mut padded_ids = vec![0u32; batch_size * max_len];
        let mut padded_types = vec![0u32; batch_size * max_len];
        let mut padded_mask = vec![0u32; batch_size * max_len];

        for (row, encoding) in encodings.iter().enumerate() {
            let offset = row * max_len;
            let len = encoding.get_ids().len();
            padded_ids[offset..offset + len].copy_from_slice(encoding.get_ids());
            padded_types[offset..offset + len].copy_from_slice(encoding.get_type_ids());
            padded_mask[offset..offset + len].copy_from_slice(encoding.get_attention_mask());
        }

        let shape = (batch_size, max_len);
        let input_ids = Tensor::from_vec(padded_ids, shape, &self.device)?;
        let token_type_ids = Tensor::from_vec(padded_types, shape, &self.device)?;
        let attention_mask = Tensor::from_vec(padded_mask, shape, &self.device)?;

        let hidden = self
            .bert
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // [CLS] token → pooler (dense + tanh) → classifier logit
        let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?.squeeze(1)?;

        Ok(logits.to_vec1::<f32>()?.into_iter().map(sigmoid).collect())
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    fn model(&self) -> &str {
        &self.model_id
    }

    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let scorer = Arc::clone(&self.scorer);
        let query = query.to_string();
        let passages: Vec<String> = passages.iter().map(|p| p.to_string()).collect();

        tokio::task::spawn_blocking(move || scorer.score_pairs(&query, &passages))
            .await
            .map_err(RetrievalError::rerank)?
            .map_err(RetrievalError::rerank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "cross-encoder/ms-marco-MiniLM-L6-v2";

    #[tokio::test]
    #[ignore] // Integration test - requires model download
    async fn test_scores_on_topic_passage_higher() {
        let reranker = CrossEncoderReranker::new(MODEL, 512).expect("Failed to load reranker");
        let scores = reranker
            .score(
                "How do I reduce S3 storage costs?",
                &[
                    "Azure Spot VMs offer deep discounts for interruptible workloads.",
                    "Use S3 lifecycle policies and Intelligent-Tiering to cut storage costs.",
                ],
            )
            .await
            .unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[1] > scores[0]);
    }

    #[tokio::test]
    #[ignore] // Integration test - requires model download
    async fn test_empty_batch() {
        let reranker = CrossEncoderReranker::new(MODEL, 512).expect("Failed to load reranker");
        assert!(reranker.score("query", &[]).await.unwrap().is_empty());
    }
}
