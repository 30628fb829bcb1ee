//! Retrieval quality evaluation
//!
//! Recall@K and Mean Reciprocal Rank computed against caller-supplied
//! relevance judgments. Documents are matched on the `id` metadata field.

pub mod evaluator;
pub mod types;

pub use evaluator::{RetrievalEvaluator, DEFAULT_MRR_WINDOW, DEFAULT_RECALL_K};
pub use types::{load_judgments, EvaluationResult, QueryEvaluation, RelevanceJudgment};
