//! Adapters over [`crate::rag::Retriever`]
//!
//! - `api`: request/response handler for an HTTP-style query surface
//! - `tool`: schema-described tool for an LLM agent

pub mod api;
pub mod tool;

pub use api::{
    HealthStatus, QueryHandler, QueryRequest, QueryResponse, QueryResult, SystemStats, MAX_TOP_K,
};
pub use tool::{RetrievalTool, ToolSchema, TOOL_TOP_K};
