// Knowledge-base lookup exposed as an agent tool with a JSON schema
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::debug;

use crate::errors::{Result, RetrievalError};
use crate::rag::{ContextBuilder, Retriever};

/// Sources handed back to the agent per call
pub const TOOL_TOP_K: usize = 3;

/// Tool description for an agent's tool list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// Parameter schema (JSON Schema)
    pub parameters: JsonValue,
}

#[derive(Deserialize)]
struct ToolArgs {
    query: String,
}

/// `retrieve_cloud_optimization_info`: reranked top sources, rendered as text
pub struct RetrievalTool {
    retriever: Arc<dyn Retriever>,
    context: ContextBuilder,
}

impl RetrievalTool {
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self {
            retriever,
            context: ContextBuilder::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        "retrieve_cloud_optimization_info"
    }

    pub fn description(&self) -> &'static str {
        "Retrieve information about cloud cost optimization from the knowledge base. \
         Use it for AWS, Azure or GCP cost optimization, storage optimization \
         (S3, Blob Storage, Cloud Storage), compute optimization (EC2, VMs, \
         Compute Engine), cost reduction strategies and FinOps best practices."
    }

    pub fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The cloud cost optimization question"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Run the tool with agent-supplied arguments
    pub async fn invoke(&self, args: &JsonValue) -> Result<String> {
        let args: ToolArgs = serde_json::from_value(args.clone()).map_err(|e| {
            RetrievalError::InvalidArgument(format!("{} arguments: {}", self.name(), e))
        })?;
        self.lookup(&args.query).await
    }

    /// Retrieve and render the top sources for `query`
    pub async fn lookup(&self, query: &str) -> Result<String> {
        let results = self.retriever.retrieve(query, TOOL_TOP_K, true).await?;
        debug!(sources = results.len(), "tool lookup");
        Ok(self.context.build(&results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_pipeline, FixedRetriever};

    #[test]
    fn test_schema_requires_query() {
        let tool = RetrievalTool::new(Arc::new(FixedRetriever::new(["a"])));
        let schema = tool.schema();
        assert_eq!(schema.name, "retrieve_cloud_optimization_info");
        assert_eq!(schema.parameters["required"], json!(["query"]));
        assert_eq!(schema.parameters["properties"]["query"]["type"], "string");
    }

    #[tokio::test]
    async fn test_invoke_formats_three_sources() {
        let tool = RetrievalTool::new(Arc::new(sample_pipeline().await.unwrap()));
        let text = tool
            .invoke(&json!({ "query": "How do I reduce S3 storage costs?" }))
            .await
            .unwrap();
        assert!(text.starts_with("[Source 1: Amazon S3 cost optimization - AWS]\n"));
        assert!(text.contains("[Source 3: "));
        assert!(!text.contains("[Source 4: "));
        assert_eq!(text.split("\n\n").count(), 3);
    }

    #[tokio::test]
    async fn test_invoke_rejects_missing_query() {
        let tool = RetrievalTool::new(Arc::new(FixedRetriever::new(["a"])));
        let err = tool.invoke(&json!({ "question": "x" })).await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_empty_results_message() {
        let empty: Vec<String> = Vec::new();
        let tool = RetrievalTool::new(Arc::new(FixedRetriever::new(empty)));
        let text = tool.lookup("anything").await.unwrap();
        assert_eq!(text, "No relevant information found in the knowledge base.");
    }
}
