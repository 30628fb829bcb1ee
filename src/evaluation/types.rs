// Evaluation inputs and reports
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{Result, RetrievalError};

/// Ground truth for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceJudgment {
    pub query: String,
    pub relevant_ids: Vec<String>,
}

impl RelevanceJudgment {
    pub fn new<S: Into<String>>(query: impl Into<String>, relevant_ids: impl IntoIterator<Item = S>) -> Self {
        Self {
            query: query.into(),
            relevant_ids: relevant_ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// Metrics for a single judged query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEvaluation {
    pub query: String,
    pub recall: f64,
    pub mrr: f64,
}

/// Aggregate over a batch of judged queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Cutoff the recall figures were computed at
    pub recall_k: usize,
    /// Mean Recall@`recall_k`
    pub avg_recall_at_k: f64,
    pub avg_mrr: f64,
    pub num_queries: usize,
    /// Per-query metrics in input order
    pub per_query: Vec<QueryEvaluation>,
}

impl EvaluationResult {
    /// Arithmetic means over `per_query`; all zeros when empty
    pub fn from_queries(per_query: Vec<QueryEvaluation>, recall_k: usize) -> Self {
        let n = per_query.len();
        let (avg_recall_at_k, avg_mrr) = if n == 0 {
            (0.0, 0.0)
        } else {
            let recall: f64 = per_query.iter().map(|q| q.recall).sum();
            let mrr: f64 = per_query.iter().map(|q| q.mrr).sum();
            (recall / n as f64, mrr / n as f64)
        };

        Self {
            recall_k,
            avg_recall_at_k,
            avg_mrr,
            num_queries: n,
            per_query,
        }
    }
}

/// Read a JSON array of `{"query": ..., "relevant_ids": [...]}` objects
pub fn load_judgments(path: &Path) -> Result<Vec<RelevanceJudgment>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        RetrievalError::ConfigError(format!(
            "Failed to read judgments {}: {}",
            path.display(),
            e
        ))
    })?;
    Ok(serde_json::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_queries_means() {
        let result = EvaluationResult::from_queries(vec![
            QueryEvaluation {
                query: "a".into(),
                recall: 1.0,
                mrr: 1.0,
            },
            QueryEvaluation {
                query: "b".into(),
                recall: 0.5,
                mrr: 0.0,
            },
        ], 5);
        assert_eq!(result.num_queries, 2);
        assert_eq!(result.recall_k, 5);
        assert!((result.avg_recall_at_k - 0.75).abs() < 1e-9);
        assert!((result.avg_mrr - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_from_queries_empty() {
        let result = EvaluationResult::from_queries(Vec::new(), 10);
        assert_eq!(result.num_queries, 0);
        assert_eq!(result.avg_recall_at_k, 0.0);
        assert_eq!(result.recall_k, 10);
        assert_eq!(result.avg_mrr, 0.0);
    }

    #[test]
    fn test_load_judgments() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"query": "S3 costs", "relevant_ids": ["aws-1", "aws-3"]}}, {{"query": "Spot VMs", "relevant_ids": []}}]"#
        )
        .unwrap();

        let judgments = load_judgments(file.path()).unwrap();
        assert_eq!(judgments.len(), 2);
        assert_eq!(judgments[0], RelevanceJudgment::new("S3 costs", ["aws-1", "aws-3"]));
        assert!(judgments[1].relevant_ids.is_empty());
    }

    #[test]
    fn test_load_judgments_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"query": "not an array"}}"#).unwrap();
        let err = load_judgments(file.path()).unwrap_err();
        assert!(matches!(err, RetrievalError::SerializationError(_)));
    }
}
