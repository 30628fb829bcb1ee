// Context builder: renders ranked candidates as source-attributed text blocks
use serde::{Deserialize, Serialize};

use crate::rag::candidate::Candidate;

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Characters of chunk text kept per block
    pub max_chars_per_source: usize,
    /// Returned when there is nothing to render
    pub empty_message: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars_per_source: 500,
            empty_message: "No relevant information found in the knowledge base.".to_string(),
        }
    }
}

/// Formats retrieved chunks as `[Source i: source - provider]` blocks
pub struct ContextBuilder {
    config: ContextConfig,
}

/// Truncate at a character boundary, never inside a UTF-8 sequence
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

impl ContextBuilder {
    /// Create new context builder with default config
    pub fn new() -> Self {
        Self {
            config: ContextConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Render one block per candidate, numbered from 1, separated by a blank line
    pub fn build(&self, candidates: &[Candidate]) -> String {
        if candidates.is_empty() {
            return self.config.empty_message.clone();
        }

        candidates
            .iter()
            .enumerate()
            .map(|(idx, candidate)| self.format_source(idx + 1, candidate))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn format_source(&self, index: usize, candidate: &Candidate) -> String {
        format!(
            "[Source {}: {} - {}]\n{}",
            index,
            candidate.metadata.source(),
            candidate.metadata.provider(),
            truncate_chars(&candidate.content, self.config.max_chars_per_source)
        )
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
