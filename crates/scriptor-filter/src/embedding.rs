//! Embedding client with a bounded in-memory cache.
//!
//! Transport failures never surface to callers: a failed lookup yields an
//! empty vector, which downstream ranking treats as "unrankable".

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

/// A single embedding vector.
pub type Embedding = Vec<f32>;

/// Trait for generating embeddings from text.
///
/// Implementations are infallible by contract: on any transport failure they
/// return an empty vector and log a warning.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Embedding;

    /// Embed multiple texts in one request.
    ///
    /// The result is order-preserving and always has the same length as the
    /// input; failed lookups come back as empty vectors.
    async fn embed_batch(&self, texts: &[String]) -> Vec<Embedding>;
}

/// Capacity-bounded cache keyed by exact text.
///
/// Eviction is by insertion order: each insert beyond capacity removes
/// exactly the oldest entry. Guarded by a mutex so overlapping executions
/// can share one cache.
pub struct EmbeddingCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, Embedding>,
    order: VecDeque<String>,
}

impl EmbeddingCache {
    /// Creates a cache; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up an embedding by exact text.
    pub fn get(&self, text: &str) -> Option<Embedding> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.entries.get(text).cloned())
    }

    /// Inserts an embedding, evicting the oldest entry on overflow.
    ///
    /// Re-inserting an existing key updates the value but keeps its original
    /// insertion position.
    pub fn insert(&self, text: &str, embedding: Embedding) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.entries.contains_key(text) {
            inner.entries.insert(text.to_owned(), embedding);
            return;
        }
        if inner.entries.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
        inner.order.push_back(text.to_owned());
        inner.entries.insert(text.to_owned(), embedding);
    }
}

/// Embedding client for an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbeddingClient {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    cache: EmbeddingCache,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbeddingClient {
    /// Creates a client for the given endpoint and model.
    pub fn new(url: String, model: String, api_key: Option<String>, cache_capacity: usize) -> Self {
        Self {
            client: Client::new(),
            url,
            model,
            api_key,
            cache: EmbeddingCache::new(cache_capacity),
        }
    }

    /// The single-lookup cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Embedding>, String> {
        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|error| format!("request failed: {error}"))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(format!("status {status}"));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|error| format!("invalid response body: {error}"))?;

        if parsed.data.len() != inputs.len() {
            return Err(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                parsed.data.len()
            ));
        }

        // The service may return items out of order; restore input order.
        let mut vectors = vec![Vec::new(); inputs.len()];
        for item in parsed.data {
            if item.index < vectors.len() {
                vectors[item.index] = item.embedding;
            }
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Embedding {
        if let Some(cached) = self.cache.get(text) {
            return cached;
        }

        let input = [text.to_owned()];
        match self.request(&input).await {
            Ok(mut vectors) => {
                let vector = vectors.pop().unwrap_or_default();
                if !vector.is_empty() {
                    self.cache.insert(text, vector.clone());
                }
                vector
            }
            Err(error) => {
                tracing::warn!("embedding lookup failed, treating as unrankable: {error}");
                Vec::new()
            }
        }
    }

    // Batch lookups bypass the single-item cache: the batch path exists for
    // whole-catalog embedding where per-text hits are rare and the cache
    // would churn. Single lookups remain the only cached path.
    async fn embed_batch(&self, texts: &[String]) -> Vec<Embedding> {
        if texts.is_empty() {
            return Vec::new();
        }

        match self.request(texts).await {
            Ok(vectors) => vectors,
            Err(error) => {
                tracing::warn!("batch embedding lookup failed, treating as unrankable: {error}");
                vec![Vec::new(); texts.len()]
            }
        }
    }
}

/// Calculate cosine similarity between two vectors.
///
/// Returns 0.0 whenever either vector is empty or the lengths differ.
pub fn cosine_similarity(vector_a: &[f32], vector_b: &[f32]) -> f32 {
    if vector_a.is_empty() || vector_b.is_empty() || vector_a.len() != vector_b.len() {
        return 0.0;
    }

    let dot_product: f32 = vector_a
        .iter()
        .zip(vector_b.iter())
        .map(|(first, second)| first * second)
        .sum();
    let magnitude_a = vector_a.iter().map(|value| value * value).sum::<f32>().sqrt();
    let magnitude_b = vector_b.iter().map(|value| value * value).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
