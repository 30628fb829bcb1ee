//! HTTP-based reranker.
//!
//! Talks to rerank APIs that accept `{"model", "query", "documents"}` and
//! answer `{"results": [{"index": 0, "relevance_score": 0.9}, ...]}` (Jina,
//! Cohere, self-hosted TEI). Results are mapped back to input order.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::Reranker;
use crate::config::RerankerConfig;
use crate::errors::{Result, RetrievalError};

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [&'a str],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

/// Remote reranker
pub struct HttpReranker {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpReranker {
    pub fn new(config: &RerankerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RetrievalError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

/// Place each `(index, score)` result back at its input position
fn scores_in_input_order(results: Vec<RerankResult>, expected: usize) -> Result<Vec<f32>> {
    let mut scores: Vec<Option<f32>> = vec![None; expected];

    for result in results {
        let slot = scores.get_mut(result.index).ok_or_else(|| {
            RetrievalError::RerankFailure(format!(
                "result index {} out of range for {} passages",
                result.index, expected
            ))
        })?;
        *slot = Some(result.relevance_score);
    }

    scores
        .into_iter()
        .enumerate()
        .map(|(i, score)| {
            score.ok_or_else(|| RetrievalError::RerankFailure(format!("no score for passage {}", i)))
        })
        .collect()
}

#[async_trait]
impl Reranker for HttpReranker {
    fn model(&self) -> &str {
        &self.model
    }

    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(&self.endpoint).json(&RerankRequest {
            model: &self.model,
            query,
            documents: passages,
            top_n: passages.len(),
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(RetrievalError::rerank)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::RerankFailure(format!(
                "rerank endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: RerankResponse = response.json().await.map_err(RetrievalError::rerank)?;
        debug!(results = parsed.results.len(), "rerank response received");

        scores_in_input_order(parsed.results, passages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: usize, relevance_score: f32) -> RerankResult {
        RerankResult {
            index,
            relevance_score,
        }
    }

    #[test]
    fn test_scores_restored_to_input_order() {
        let results = vec![result(2, 0.9), result(0, 0.5), result(1, 0.1)];
        let scores = scores_in_input_order(results, 3).unwrap();
        assert_eq!(scores, vec![0.5, 0.1, 0.9]);
    }

    #[test]
    fn test_missing_score_is_rerank_failure() {
        let err = scores_in_input_order(vec![result(0, 0.5)], 2).unwrap_err();
        assert!(matches!(err, RetrievalError::RerankFailure(_)));
    }

    #[test]
    fn test_out_of_range_index_is_rerank_failure() {
        let err = scores_in_input_order(vec![result(5, 0.5)], 1).unwrap_err();
        assert!(matches!(err, RetrievalError::RerankFailure(_)));
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"model":"m","results":[{"index":1,"relevance_score":0.8,"document":{"text":"b"}},{"index":0,"relevance_score":0.2}]}"#;
        let parsed: RerankResponse = serde_json::from_str(body).unwrap();
        assert_eq!(scores_in_input_order(parsed.results, 2).unwrap(), vec![0.2, 0.8]);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_rerank_failure() {
        let config = RerankerConfig {
            endpoint: "http://127.0.0.1:1/rerank".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let reranker = HttpReranker::new(&config).unwrap();
        let err = reranker.score("q", &["a", "b"]).await.unwrap_err();
        assert!(matches!(err, RetrievalError::RerankFailure(_)));
    }
}
