//! Configuration types for pre-filtering and sandbox execution.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Complete scriptor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptorConfig {
    /// Semantic pre-filter configuration.
    pub filter: FilterConfig,
    /// Sandbox execution configuration.
    pub sandbox: SandboxConfig,
}

impl ScriptorConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }
}

/// Semantic pre-filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Whether pre-filtering is enabled at all.
    pub enabled: bool,
    /// Embedding service endpoint (OpenAI-compatible `/embeddings`).
    pub embedding_url: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Rerank service endpoint; reranking is skipped when absent.
    pub rerank_url: Option<String>,
    /// Rerank model name.
    pub rerank_model: String,
    /// Bearer token sent to both services when present.
    pub api_key: Option<String>,
    /// Shortlist size taken from cosine ranking.
    pub top_k_initial: usize,
    /// Final number of tools surfaced after reranking or truncation.
    pub top_k_final: usize,
    /// Enum arrays longer than this are truncated during schema reduction.
    pub enum_reduction_threshold: usize,
    /// Whether the rerank pass runs over the cosine shortlist.
    pub use_reranking: bool,
    /// Optional static query applied when the caller supplies none.
    pub static_query: Option<String>,
    /// Catalog size above which `search_tools` routes through the
    /// semantic pre-filter instead of substring matching.
    pub search_threshold: usize,
    /// Capacity of the in-memory embedding cache (clamped to at least 1).
    pub cache_capacity: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            embedding_url: "http://localhost:11434/v1/embeddings".to_owned(),
            embedding_model: "nomic-embed-text".to_owned(),
            rerank_url: None,
            rerank_model: "bge-reranker-v2-m3".to_owned(),
            api_key: None,
            top_k_initial: 20,
            top_k_final: 10,
            enum_reduction_threshold: 20,
            use_reranking: false,
            static_query: None,
            search_threshold: 30,
            cache_capacity: 256,
        }
    }
}

impl FilterConfig {
    /// Embedding cache capacity with the ≥ 1 invariant applied.
    pub fn effective_cache_capacity(&self) -> usize {
        self.cache_capacity.max(1)
    }
}

/// Sandbox execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Default wall-clock deadline for script execution, in seconds.
    pub timeout_seconds: u64,
    /// Upper bound on iterations of any single loop. The deadline abandons
    /// a busy-waiting script rather than killing it; this bound makes the
    /// abandoned worker terminate instead of spinning forever.
    pub loop_iteration_limit: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            loop_iteration_limit: 10_000_000,
        }
    }
}
