//! Second-pass relevance scoring over a cosine shortlist.
//!
//! Like the embedding client, rerankers are infallible by contract: on any
//! transport failure they degrade to prior scores or input order instead of
//! surfacing an error.

use std::cmp::Ordering;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

/// Trait for reranking candidate texts against a query.
#[async_trait]
pub trait RerankProvider: Send + Sync {
    /// Scores `candidates` against `query` and returns `(original_index,
    /// score)` pairs ordered by descending score.
    ///
    /// When `prior_scores` is present and matches the candidate count, the
    /// returned score is the arithmetic mean of the service score and the
    /// prior. On transport failure the result falls back to sorting by
    /// priors when present, else a uniform score preserving input order.
    async fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        prior_scores: Option<&[f32]>,
    ) -> Vec<(usize, f32)>;
}

/// Reranker backed by a Cohere-style `/rerank` endpoint.
pub struct HttpReranker {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankItem>,
}

#[derive(Debug, Deserialize)]
struct RerankItem {
    index: usize,
    relevance_score: f32,
}

impl HttpReranker {
    /// Creates a reranker for the given endpoint and model.
    pub fn new(url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url,
            model,
            api_key,
        }
    }

    async fn request(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, String> {
        let body = json!({
            "model": self.model,
            "query": query,
            "documents": candidates,
            "top_n": candidates.len(),
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

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|error| format!("invalid response body: {error}"))?;

        let mut scores = vec![f32::NAN; candidates.len()];
        for item in parsed.results {
            if item.index < scores.len() {
                scores[item.index] = item.relevance_score;
            }
        }
        if scores.iter().any(|score| score.is_nan()) {
            return Err(format!(
                "service scored {} of {} candidates",
                scores.iter().filter(|score| !score.is_nan()).count(),
                candidates.len()
            ));
        }
        Ok(scores)
    }
}

#[async_trait]
impl RerankProvider for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        prior_scores: Option<&[f32]>,
    ) -> Vec<(usize, f32)> {
        if candidates.is_empty() {
            return Vec::new();
        }

        match self.request(query, candidates).await {
            Ok(scores) => combine_and_sort(&scores, prior_scores),
            Err(error) => {
                tracing::warn!("rerank failed, falling back to prior scores: {error}");
                fallback_ranking(candidates.len(), prior_scores)
            }
        }
    }
}

/// Blends service scores with priors (arithmetic mean when lengths match)
/// and sorts descending, ties broken by original index ascending.
pub fn combine_and_sort(scores: &[f32], prior_scores: Option<&[f32]>) -> Vec<(usize, f32)> {
    let combined: Vec<(usize, f32)> = scores
        .iter()
        .enumerate()
        .map(|(index, score)| {
            let blended = match prior_scores {
                Some(priors) if priors.len() == scores.len() => (score + priors[index]) / 2.0,
                _ => *score,
            };
            (index, blended)
        })
        .collect();
    sort_descending(combined)
}

/// Ranking used when the scoring service is unreachable.
pub fn fallback_ranking(count: usize, prior_scores: Option<&[f32]>) -> Vec<(usize, f32)> {
    match prior_scores {
        Some(priors) if priors.len() == count => {
            let pairs = priors
                .iter()
                .enumerate()
                .map(|(index, score)| (index, *score))
                .collect();
            sort_descending(pairs)
        }
        _ => (0..count).map(|index| (index, 0.5)).collect(),
    }
}

fn sort_descending(mut pairs: Vec<(usize, f32)>) -> Vec<(usize, f32)> {
    pairs.sort_by(|first, second| {
        second
            .1
            .partial_cmp(&first.1)
            .unwrap_or(Ordering::Equal)
            .then(first.0.cmp(&second.0))
    });
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_means_scores_with_matching_priors() {
        let ranked = combine_and_sort(&[0.2, 0.8], Some(&[0.4, 0.0]));
        // (0.2+0.4)/2 = 0.3, (0.8+0.0)/2 = 0.4
        assert_eq!(ranked[0].0, 1);
        assert!((ranked[0].1 - 0.4).abs() < 1e-6);
        assert_eq!(ranked[1].0, 0);
        assert!((ranked[1].1 - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_combine_ignores_mismatched_priors() {
        let ranked = combine_and_sort(&[0.2, 0.8], Some(&[0.4]));
        assert_eq!(ranked[0], (1, 0.8));
        assert_eq!(ranked[1], (0, 0.2));
    }

    #[test]
    fn test_fallback_sorts_by_priors() {
        let ranked = fallback_ranking(3, Some(&[0.1, 0.9, 0.5]));
        let order: Vec<usize> = ranked.iter().map(|(index, _)| *index).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_fallback_uniform_preserves_order() {
        let ranked = fallback_ranking(3, None);
        assert_eq!(ranked, vec![(0, 0.5), (1, 0.5), (2, 0.5)]);
    }

    #[test]
    fn test_ties_broken_by_index() {
        let ranked = combine_and_sort(&[0.5, 0.5, 0.7], None);
        let order: Vec<usize> = ranked.iter().map(|(index, _)| *index).collect();
        assert_eq!(order, vec![2, 0, 1]);
    }
}
