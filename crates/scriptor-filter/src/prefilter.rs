//! Semantic pre-filtering of tool catalogs.
//!
//! Ranking is an optimization, never a gate: every degraded path (missing
//! query, unavailable embeddings, length mismatches) fails open and returns
//! the whole catalog, schema-reduced, with identity indices.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;

use scriptor_core::{FilterConfig, FilterOutcome, ToolDescriptor};

use crate::embedding::{EmbeddingProvider, cosine_similarity};
use crate::rerank::RerankProvider;
use crate::schema::reduce_descriptor;

/// Reduces a tool catalog to its most relevant subset for a query.
///
/// Owns its embedding provider and optional reranker; the embedding cache
/// lives inside the provider, so one pre-filter instance is the unit of
/// shared state across executions.
pub struct SemanticPreFilter {
    config: FilterConfig,
    embeddings: Arc<dyn EmbeddingProvider>,
    reranker: Option<Arc<dyn RerankProvider>>,
}

impl SemanticPreFilter {
    /// Creates a pre-filter with no reranking pass.
    pub fn new(config: FilterConfig, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            config,
            embeddings,
            reranker: None,
        }
    }

    /// Attaches a reranker for the second-pass scoring step.
    #[must_use]
    pub fn with_reranker(mut self, reranker: Arc<dyn RerankProvider>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// The filter configuration this instance was built with.
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Filters `tools` down to the most relevant `top_k_final` for `query`.
    ///
    /// Returns parallel arrays of surviving tools and their original catalog
    /// indices. With no query, or a catalog already at or under
    /// `top_k_final`, every tool survives in original order.
    pub async fn filter_tools(
        &self,
        tools: Vec<ToolDescriptor>,
        query: Option<&str>,
        use_reranking: bool,
    ) -> FilterOutcome {
        if tools.is_empty() {
            return FilterOutcome::default();
        }

        let query = query.map(str::trim).filter(|text| !text.is_empty());
        let Some(query) = query else {
            return self.reduce_all(tools);
        };
        if tools.len() <= self.config.top_k_final {
            return self.reduce_all(tools);
        }

        let texts: Vec<String> = tools.iter().map(tool_text).collect();
        let query_vector = self.embeddings.embed(query).await;
        if query_vector.is_empty() {
            tracing::warn!("query embedding unavailable, returning full catalog");
            return self.reduce_all(tools);
        }

        let tool_vectors = self.embeddings.embed_batch(&texts).await;
        let usable = tool_vectors.len() == tools.len()
            && tool_vectors
                .iter()
                .all(|vector| vector.len() == query_vector.len());
        if !usable {
            tracing::warn!(
                tools = tools.len(),
                vectors = tool_vectors.len(),
                "tool embeddings unavailable or mismatched, returning full catalog"
            );
            return self.reduce_all(tools);
        }

        let mut scored: Vec<(usize, f32)> = tool_vectors
            .iter()
            .enumerate()
            .map(|(index, vector)| (index, cosine_similarity(&query_vector, vector)))
            .collect();
        scored.sort_by(|first, second| {
            second
                .1
                .partial_cmp(&first.1)
                .unwrap_or(Ordering::Equal)
                .then(first.0.cmp(&second.0))
        });
        let shortlist: Vec<(usize, f32)> =
            scored.into_iter().take(self.config.top_k_initial).collect();

        let selected = self
            .select_final(query, &texts, shortlist, use_reranking)
            .await;

        let mut filtered: Vec<ToolDescriptor> = selected
            .iter()
            .filter_map(|index| tools.get(*index).cloned())
            .collect();
        let mut indices = selected;

        // Length mismatch here is a defect signal; truncate rather than fail.
        if filtered.len() != indices.len() {
            tracing::error!(
                tools = filtered.len(),
                indices = indices.len(),
                "filtered tools and indices diverged, truncating to shorter"
            );
            let shorter = filtered.len().min(indices.len());
            filtered.truncate(shorter);
            indices.truncate(shorter);
        }

        let threshold = self.config.enum_reduction_threshold;
        FilterOutcome {
            tools: filtered
                .into_iter()
                .map(|tool| reduce_descriptor(tool, threshold))
                .collect(),
            indices,
        }
    }

    /// Applies reranking (or plain truncation) to the cosine shortlist,
    /// returning original catalog indices in final order.
    async fn select_final(
        &self,
        query: &str,
        texts: &[String],
        shortlist: Vec<(usize, f32)>,
        use_reranking: bool,
    ) -> Vec<usize> {
        let final_count = self.config.top_k_final;
        if use_reranking && shortlist.len() > final_count {
            if let Some(reranker) = &self.reranker {
                let candidates: Vec<String> = shortlist
                    .iter()
                    .map(|(index, _)| texts[*index].clone())
                    .collect();
                let priors: Vec<f32> = shortlist.iter().map(|(_, score)| *score).collect();
                let ranked = reranker.rerank(query, &candidates, Some(&priors)).await;
                return ranked
                    .into_iter()
                    .filter_map(|(position, _)| shortlist.get(position).map(|(index, _)| *index))
                    .take(final_count)
                    .collect();
            }
        }
        shortlist
            .into_iter()
            .take(final_count)
            .map(|(index, _)| index)
            .collect()
    }

    fn reduce_all(&self, tools: Vec<ToolDescriptor>) -> FilterOutcome {
        let threshold = self.config.enum_reduction_threshold;
        let reduced = tools
            .into_iter()
            .map(|tool| reduce_descriptor(tool, threshold))
            .collect();
        FilterOutcome::identity(reduced)
    }
}

/// Builds the text embedded for a tool: name, description, and parameter
/// names/types/descriptions from its schema.
pub fn tool_text(tool: &ToolDescriptor) -> String {
    let mut text = format!("{}: {}", tool.name, tool.description);
    if let Some(Value::Object(properties)) = tool.input_schema.get("properties") {
        for (name, property) in properties {
            let kind = property
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("any");
            let description = property
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("");
            text.push_str(&format!("\n{name} ({kind}): {description}"));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_text_includes_parameters() {
        let tool = ToolDescriptor::new("fs", "read_file", "Read a file from the filesystem")
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Path to read" }
                }
            }));
        let text = tool_text(&tool);
        assert!(text.starts_with("read_file: Read a file"));
        assert!(text.contains("path (string): Path to read"));
    }

    #[test]
    fn test_tool_text_without_schema() {
        let tool = ToolDescriptor::new("fs", "list_dir", "List a directory");
        assert_eq!(tool_text(&tool), "list_dir: List a directory");
    }
}
