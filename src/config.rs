//! Configuration management for finops-retrieval
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.finops-retrieval/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{Result, RetrievalError};

/// Environment variable consulted when no embedding API key is configured
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable overriding the vector store URL
pub const QDRANT_URL_ENV: &str = "QDRANT_URL";
/// Environment variable overriding the vector store API key
pub const QDRANT_API_KEY_ENV: &str = "QDRANT_API_KEY";

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub reranker: RerankerConfig,
    pub retrieval: RetrievalConfig,
    pub evaluation: EvaluationConfig,
    pub logging: LoggingConfig,
}

/// Which embedding provider to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// BERT sentence encoder run locally through candle
    Local,
    /// OpenAI-compatible `/embeddings` endpoint
    Openai,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

/// Which vector store to connect to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Qdrant,
    /// In-process store, filled from `seed_file` at startup
    Memory,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    /// JSON array of payload objects embedded into the memory backend
    pub seed_file: Option<PathBuf>,
}

/// Which reranker to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankerBackend {
    /// Cross-encoder run locally through candle
    CrossEncoder,
    /// Remote rerank endpoint (Jina/Cohere style)
    Http,
}

/// Reranker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    pub backend: RerankerBackend,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Maximum tokens per (query, passage) pair
    pub max_length: usize,
    pub timeout_secs: u64,
}

/// Pipeline behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Stage-1 pool size, independent of the requested top_k
    pub candidate_pool: usize,
    pub default_top_k: usize,
    pub use_reranking: bool,
}

/// Evaluation windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub recall_k: usize,
    pub mrr_window: usize,
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Openai,
            model: "text-embedding-3-small".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Qdrant,
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection: "cloud_cost_optimization".to_string(),
            seed_file: None,
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            backend: RerankerBackend::CrossEncoder,
            model: "cross-encoder/ms-marco-MiniLM-L6-v2".to_string(),
            endpoint: "https://api.jina.ai/v1/rerank".to_string(),
            api_key: None,
            max_length: 512,
            timeout_secs: 30,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_pool: 20,
            default_top_k: 5,
            use_reranking: true,
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            recall_k: 5,
            mrr_window: 20,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(config_path) = path {
            Self::load_from_file(&config_path)?
        } else {
            Self::load_default()?
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RetrievalError::ConfigError(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| RetrievalError::ConfigError(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load from the standard location or fall back to built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Standard configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".finops-retrieval").join("config.toml"))
    }

    /// Fill secrets and endpoints from the environment where the file leaves them unset
    pub fn apply_env(&mut self) {
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = std::env::var(OPENAI_API_KEY_ENV).ok();
        }
        if let Ok(url) = std::env::var(QDRANT_URL_ENV) {
            self.store.url = url;
        }
        if self.store.api_key.is_none() {
            self.store.api_key = std::env::var(QDRANT_API_KEY_ENV).ok();
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.candidate_pool == 0 {
            return Err(RetrievalError::ConfigError(
                "candidate_pool must be greater than 0".to_string(),
            ));
        }

        if self.retrieval.default_top_k == 0 {
            return Err(RetrievalError::ConfigError(
                "default_top_k must be greater than 0".to_string(),
            ));
        }

        if self.evaluation.recall_k == 0 || self.evaluation.mrr_window == 0 {
            return Err(RetrievalError::ConfigError(
                "evaluation windows must be greater than 0".to_string(),
            ));
        }

        if self.store.collection.trim().is_empty() {
            return Err(RetrievalError::ConfigError(
                "store.collection must not be empty".to_string(),
            ));
        }

        if self.store.seed_file.is_some() && self.store.backend != StoreBackend::Memory {
            return Err(RetrievalError::ConfigError(
                "store.seed_file is only used by the memory backend".to_string(),
            ));
        }

        if self.reranker.max_length == 0 {
            return Err(RetrievalError::ConfigError(
                "reranker.max_length must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(RetrievalError::ConfigError(format!(
                    "Invalid log level: {}",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RetrievalError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;

        Ok(())
    }
}
