// Recall@K and MRR over any Retriever
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::types::{EvaluationResult, QueryEvaluation, RelevanceJudgment};
use crate::config::EvaluationConfig;
use crate::errors::{Result, RetrievalError};
use crate::rag::pipeline::{require_positive, require_query};
use crate::rag::{Candidate, Retriever};

/// Results scored by Recall@K in `evaluate_queries`
pub const DEFAULT_RECALL_K: usize = 5;
/// Results scanned for the first relevant hit in `mean_reciprocal_rank`
pub const DEFAULT_MRR_WINDOW: usize = 20;

fn retrieved_ids(results: &[Candidate]) -> Vec<String> {
    results.iter().map(|c| c.metadata.id_or_empty()).collect()
}

/// Scores retrieval quality against relevance judgments
pub struct RetrievalEvaluator {
    retriever: Arc<dyn Retriever>,
    recall_k: usize,
    mrr_window: usize,
}

impl RetrievalEvaluator {
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self {
            retriever,
            recall_k: DEFAULT_RECALL_K,
            mrr_window: DEFAULT_MRR_WINDOW,
        }
    }

    /// Use the configured Recall@K and MRR windows
    pub fn with_config(retriever: Arc<dyn Retriever>, config: &EvaluationConfig) -> Result<Self> {
        if config.recall_k == 0 || config.mrr_window == 0 {
            return Err(RetrievalError::InvalidArgument(
                "evaluation windows must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            retriever,
            recall_k: config.recall_k,
            mrr_window: config.mrr_window,
        })
    }

    pub fn recall_k(&self) -> usize {
        self.recall_k
    }

    pub fn mrr_window(&self) -> usize {
        self.mrr_window
    }

    /// Share of distinct relevant ids found among the top `k` reranked results
    #[instrument(skip(self, relevant_ids), fields(relevant = relevant_ids.len()))]
    pub async fn recall_at_k(&self, query: &str, relevant_ids: &[String], k: usize) -> Result<f64> {
        require_query(query)?;
        require_positive("k", k)?;

        let relevant: HashSet<&str> = relevant_ids.iter().map(String::as_str).collect();
        if relevant.is_empty() {
            return Ok(0.0);
        }

        let results = self.retriever.retrieve(query, k, true).await?;
        let ids = retrieved_ids(&results);
        let retrieved: HashSet<&str> = ids.iter().map(String::as_str).collect();

        let found = relevant.intersection(&retrieved).count();
        let recall = found as f64 / relevant.len() as f64;
        debug!(found, recall, "recall computed");
        Ok(recall)
    }

    /// Reciprocal rank of the first relevant result within the MRR window
    #[instrument(skip(self, relevant_ids), fields(relevant = relevant_ids.len()))]
    pub async fn mean_reciprocal_rank(&self, query: &str, relevant_ids: &[String]) -> Result<f64> {
        require_query(query)?;

        let relevant: HashSet<&str> = relevant_ids.iter().map(String::as_str).collect();
        let results = self.retriever.retrieve(query, self.mrr_window, true).await?;

        let rank = retrieved_ids(&results)
            .iter()
            .position(|id| relevant.contains(id.as_str()))
            .map(|idx| idx + 1);

        debug!(?rank, "first relevant rank");
        Ok(rank.map_or(0.0, |r| 1.0 / r as f64))
    }

    /// Recall@K and MRR per judgment, plus their means
    pub async fn evaluate_queries(&self, judgments: &[RelevanceJudgment]) -> Result<EvaluationResult> {
        self.evaluate_with_progress(judgments, |_, _| {}).await
    }

    /// `evaluate_queries`, calling `on_query` after each judgment is scored
    #[instrument(skip(self, judgments, on_query), fields(queries = judgments.len()))]
    pub async fn evaluate_with_progress<F>(
        &self,
        judgments: &[RelevanceJudgment],
        mut on_query: F,
    ) -> Result<EvaluationResult>
    where
        F: FnMut(usize, &QueryEvaluation) + Send,
    {
        let mut per_query = Vec::with_capacity(judgments.len());

        for (idx, judgment) in judgments.iter().enumerate() {
            let recall = self
                .recall_at_k(&judgment.query, &judgment.relevant_ids, self.recall_k)
                .await?;
            let mrr = self
                .mean_reciprocal_rank(&judgment.query, &judgment.relevant_ids)
                .await?;

            let evaluation = QueryEvaluation {
                query: judgment.query.clone(),
                recall,
                mrr,
            };
            on_query(idx, &evaluation);
            per_query.push(evaluation);
        }

        let result = EvaluationResult::from_queries(per_query, self.recall_k);
        info!(
            queries = result.num_queries,
            recall_k = result.recall_k,
            avg_recall = result.avg_recall_at_k,
            avg_mrr = result.avg_mrr,
            "evaluation complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_pipeline, FixedRetriever};

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn evaluator_over(ranked: &[&str]) -> (Arc<FixedRetriever>, RetrievalEvaluator) {
        let retriever = Arc::new(FixedRetriever::new(ranked.iter().copied()));
        let evaluator = RetrievalEvaluator::new(retriever.clone());
        (retriever, evaluator)
    }

    #[tokio::test]
    async fn test_recall_empty_relevant_skips_retrieval() {
        let (retriever, evaluator) = evaluator_over(&["a"]);
        assert_eq!(evaluator.recall_at_k("q", &[], 5).await.unwrap(), 0.0);
        assert_eq!(retriever.calls(), 0);
    }

    #[tokio::test]
    async fn test_recall_rejects_bad_arguments_with_empty_relevant() {
        let (retriever, evaluator) = evaluator_over(&["a"]);
        let err = evaluator.recall_at_k("", &[], 5).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidArgument(_)));
        let err = evaluator.recall_at_k("q", &[], 0).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidArgument(_)));
        let err = evaluator.recall_at_k("  ", &ids(&["a"]), 5).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidArgument(_)));
        assert_eq!(retriever.calls(), 0);
    }

    #[tokio::test]
    async fn test_evaluate_rejects_blank_query_without_judged_ids() {
        let (_, evaluator) = evaluator_over(&["a"]);
        let err = evaluator
            .evaluate_queries(&[RelevanceJudgment::new("", Vec::<String>::new())])
            .await
            .unwrap_err();
        assert_eq!(err.stage(), crate::errors::PipelineStage::Validation);
    }

    #[tokio::test]
    async fn test_recall_partial_and_full() {
        let (_, evaluator) = evaluator_over(&["a", "x", "b", "y", "z", "c"]);
        let recall = evaluator.recall_at_k("q", &ids(&["a", "c"]), 5).await.unwrap();
        assert!((recall - 0.5).abs() < 1e-9);
        let recall = evaluator.recall_at_k("q", &ids(&["a", "b"]), 5).await.unwrap();
        assert_eq!(recall, 1.0);
    }

    #[tokio::test]
    async fn test_recall_deduplicates_relevant_ids() {
        let (_, evaluator) = evaluator_over(&["a", "b"]);
        let recall = evaluator
            .recall_at_k("q", &ids(&["a", "a", "a"]), 5)
            .await
            .unwrap();
        assert_eq!(recall, 1.0);
    }

    #[tokio::test]
    async fn test_recall_no_match() {
        let (_, evaluator) = evaluator_over(&["x", "y"]);
        assert_eq!(evaluator.recall_at_k("q", &ids(&["a"]), 5).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_mrr_rank() {
        let (_, evaluator) = evaluator_over(&["x", "y", "a", "b"]);
        let mrr = evaluator.mean_reciprocal_rank("q", &ids(&["a", "b"])).await.unwrap();
        assert!((mrr - 1.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_mrr_outside_window_is_zero() {
        let mut ranked: Vec<String> = (0..25).map(|i| format!("d{}", i)).collect();
        ranked.push("target".to_string());
        let evaluator = RetrievalEvaluator::new(Arc::new(FixedRetriever::new(ranked)));
        let mrr = evaluator.mean_reciprocal_rank("q", &ids(&["target"])).await.unwrap();
        assert_eq!(mrr, 0.0);
    }

    #[tokio::test]
    async fn test_with_config_windows() {
        let retriever = Arc::new(FixedRetriever::new(["x", "a"]));
        let config = EvaluationConfig {
            recall_k: 1,
            mrr_window: 1,
        };
        let evaluator = RetrievalEvaluator::with_config(retriever, &config).unwrap();
        assert_eq!((evaluator.recall_k(), evaluator.mrr_window()), (1, 1));
        let result = evaluator
            .evaluate_queries(&[RelevanceJudgment::new("q", ["a"])])
            .await
            .unwrap();
        assert_eq!(result.recall_k, 1);
        assert_eq!(result.avg_recall_at_k, 0.0);
        assert_eq!(result.avg_mrr, 0.0);

        let bad = EvaluationConfig {
            recall_k: 0,
            mrr_window: 20,
        };
        let retriever = Arc::new(FixedRetriever::new(["x"]));
        assert!(RetrievalEvaluator::with_config(retriever, &bad).is_err());
    }

    #[tokio::test]
    async fn test_evaluate_queries_empty() {
        let (retriever, evaluator) = evaluator_over(&["a"]);
        let result = evaluator.evaluate_queries(&[]).await.unwrap();
        assert_eq!(result.num_queries, 0);
        assert_eq!(result.avg_mrr, 0.0);
        assert_eq!(retriever.calls(), 0);
    }

    #[tokio::test]
    async fn test_evaluate_queries_progress_in_order() {
        let (_, evaluator) = evaluator_over(&["a", "b"]);
        let judgments = vec![
            RelevanceJudgment::new("first", ["a"]),
            RelevanceJudgment::new("second", ["b"]),
        ];
        let mut seen = Vec::new();
        let result = evaluator
            .evaluate_with_progress(&judgments, |idx, q| seen.push((idx, q.mrr)))
            .await
            .unwrap();
        assert_eq!(seen, vec![(0, 1.0), (1, 0.5)]);
        assert!((result.avg_mrr - 0.75).abs() < 1e-9);
        assert_eq!(result.per_query[1].query, "second");
    }

    #[tokio::test]
    async fn test_evaluate_aborts_on_pipeline_error() {
        let pipeline = sample_pipeline().await.unwrap();
        let evaluator = RetrievalEvaluator::new(Arc::new(pipeline));
        let judgments = vec![
            RelevanceJudgment::new("S3 storage", ["aws-1"]),
            RelevanceJudgment::new("   ", ["aws-1"]),
        ];
        let err = evaluator.evaluate_queries(&judgments).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidArgument(_)));
    }
}
