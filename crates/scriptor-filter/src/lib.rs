//! Semantic pre-filtering for oversized tool catalogs.
//!
//! This crate reduces a catalog of remotely-callable tools to a relevant
//! subset before it is exposed to script code:
//! - embedding-based cosine ranking with a bounded in-memory cache
//! - an optional second-pass reranking step over the shortlist
//! - lossy schema reduction of oversized enumerations
//!
//! Every external-service failure degrades to fail-open behavior; callers
//! never receive fewer or malformed tools because a service was down.

/// Embedding client, bounded cache, and cosine similarity.
pub mod embedding;
/// Semantic pre-filter composing embeddings, reranking, and reduction.
pub mod prefilter;
/// Second-pass relevance scoring.
pub mod rerank;
/// Enum reduction over JSON-schema-shaped trees.
pub mod schema;

pub use embedding::{EmbeddingCache, EmbeddingProvider, HttpEmbeddingClient, cosine_similarity};
pub use prefilter::{SemanticPreFilter, tool_text};
pub use rerank::{HttpReranker, RerankProvider};
pub use schema::{ORIGINAL_COUNT_KEY, TRUNCATED_KEY, reduce_descriptor, reduce_schema};
