//! Catalog of tools across connected providers.

use std::collections::HashMap;
use std::sync::Arc;

use scriptor_core::{ToolDescriptor, ToolProvider};

/// Snapshot of provider→tools with the providers themselves, in
/// registration order.
#[derive(Default)]
pub struct Catalog {
    providers: Vec<Arc<dyn ToolProvider>>,
    tools: HashMap<String, Vec<ToolDescriptor>>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn ToolProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Refreshes the tool snapshot from every registered provider.
    ///
    /// A provider that fails to list keeps its previous snapshot (empty for
    /// a fresh catalog); the failure is logged, not surfaced, so one broken
    /// provider cannot take the whole catalog down.
    pub async fn refresh(&mut self) {
        for provider in &self.providers {
            match provider.list_tools().await {
                Ok(mut tools) => {
                    // Provenance: every descriptor carries its provider id.
                    for tool in &mut tools {
                        tool.provider_id = provider.id().to_owned();
                    }
                    self.tools.insert(provider.id().to_owned(), tools);
                }
                Err(error) => {
                    tracing::warn!(
                        provider = provider.id(),
                        "failed to list tools, keeping previous snapshot: {error}"
                    );
                }
            }
        }
    }

    /// Registered providers in registration order.
    pub fn providers(&self) -> &[Arc<dyn ToolProvider>] {
        &self.providers
    }

    /// Looks up a provider by id.
    pub fn provider(&self, id: &str) -> Option<Arc<dyn ToolProvider>> {
        self.providers
            .iter()
            .find(|provider| provider.id() == id)
            .cloned()
    }

    /// Provider→tools pairs in provider registration order.
    pub fn grouped(&self) -> Vec<(String, Vec<ToolDescriptor>)> {
        self.providers
            .iter()
            .map(|provider| {
                let id = provider.id().to_owned();
                let tools = self.tools.get(&id).cloned().unwrap_or_default();
                (id, tools)
            })
            .collect()
    }

    /// All tools flattened in provider registration order.
    pub fn flattened(&self) -> Vec<ToolDescriptor> {
        self.grouped()
            .into_iter()
            .flat_map(|(_, tools)| tools)
            .collect()
    }

    /// Total number of tools across providers.
    pub fn total_tools(&self) -> usize {
        self.providers
            .iter()
            .map(|provider| {
                self.tools
                    .get(provider.id())
                    .map_or(0, Vec::len)
            })
            .sum()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether any providers are registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
