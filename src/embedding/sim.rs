//! `SimEmbeddingProvider` - deterministic embeddings for tests and development.
//!
//! `TigerStyle`: Primary implementation; real backends are secondary.
//!
//! Texts are embedded as a hashed bag-of-tokens projection: each token
//! hashes to a dimension, the vector is L2-normalized. Shared vocabulary
//! therefore yields high cosine similarity, which is enough to exercise
//! every contract of the semantic index layer without any model weights.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use super::{EmbeddingError, EmbeddingProvider};
use crate::constants::EMBEDDING_DIMENSIONS_COUNT;

/// Deterministic, dependency-free embedding provider.
///
/// Same text always produces the same vector, across processes and runs.
#[derive(Debug, Clone, Default)]
pub struct SimEmbeddingProvider {
    dimensions: usize,
}

impl SimEmbeddingProvider {
    /// Create a provider with the default dimensionality.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dimensions: EMBEDDING_DIMENSIONS_COUNT,
        }
    }

    /// Create a provider with explicit dimensionality.
    ///
    /// # Panics
    /// Panics if `dimensions` is zero.
    #[must_use]
    pub fn with_dimensions(dimensions: usize) -> Self {
        assert!(dimensions > 0, "dimensions must be positive");
        Self { dimensions }
    }

    fn project(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let slot = (hasher.finish() as usize) % self.dimensions;
            vector[slot] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for SimEmbeddingProvider {
    #[tracing::instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        Ok(self.project(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &'static str {
        "sim"
    }

    fn is_simulation(&self) -> bool {
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[tokio::test]
    async fn test_determinism() {
        let provider = SimEmbeddingProvider::new();
        let a = provider.embed("Alice works at Acme").await.unwrap();
        let b = provider.embed("Alice works at Acme").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_unit_norm() {
        let provider = SimEmbeddingProvider::new();
        let v = provider.embed("User prefers dark mode").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let provider = SimEmbeddingProvider::new();
        let query = provider.embed("python agent").await.unwrap();
        let related = provider
            .embed("Working on Python agent runtime")
            .await
            .unwrap();
        let unrelated = provider
            .embed("Rainfall patterns differ regionally")
            .await
            .unwrap();

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let provider = SimEmbeddingProvider::new();
        let result = provider.embed("   ").await;
        assert!(matches!(result, Err(EmbeddingError::EmptyInput)));
    }

    #[tokio::test]
    async fn test_explicit_dimensions() {
        let provider = SimEmbeddingProvider::with_dimensions(32);
        let v = provider.embed("dimension check").await.unwrap();
        assert_eq!(v.len(), 32);
        assert_eq!(provider.dimensions(), 32);
    }
}
