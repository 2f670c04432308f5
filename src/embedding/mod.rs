//! Embedding Provider Trait - the external `EmbedAndIndex` capability seam.
//!
//! `TigerStyle`: Simulation-first embedding generation.
//!
//! # Architecture
//!
//! ```text
//! EmbeddingProvider (trait)
//! └── SimEmbeddingProvider   (always available, deterministic)
//! ```
//!
//! The vault never depends on which backend is plugged in: the semantic
//! index layer treats every provider as `embed(text) -> vector` and keeps
//! the vault, not the vectors, as the source of truth.
//!
//! # Usage
//!
//! ```rust
//! use vigil::embedding::{EmbeddingProvider, SimEmbeddingProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = SimEmbeddingProvider::new();
//!     let embedding = provider.embed("Alice works at Acme").await.unwrap();
//!     assert_eq!(embedding.len(), provider.dimensions());
//! }
//! ```

mod sim;

pub use sim::SimEmbeddingProvider;

use async_trait::async_trait;

// =============================================================================
// Error Types
// =============================================================================

/// Unified error type for all embedding providers.
///
/// `TigerStyle`: Explicit variants for all failure modes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Empty input provided
    #[error("Empty input provided")]
    EmptyInput,

    /// Service unavailable
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Reason for unavailability
        message: String,
    },

    /// Invalid response from provider
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of what was invalid
        message: String,
    },

    /// Dimension mismatch in returned embedding
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions
        expected: usize,
        /// Actual dimensions received
        actual: usize,
    },
}

impl EmbeddingError {
    /// Create a service unavailable error.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Check if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::ServiceUnavailable { .. })
    }
}

// =============================================================================
// Provider Trait
// =============================================================================

/// Trait for embedding providers.
///
/// `TigerStyle`: Unified interface for simulation and production.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a text into a unit-normalized vector.
    ///
    /// # Errors
    /// Returns `EmbeddingError` on failure or empty input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// The dimensionality every returned vector must have.
    fn dimensions(&self) -> usize;

    /// Get the provider name for logging/debugging.
    fn name(&self) -> &'static str;

    /// Check if this is a simulation provider.
    fn is_simulation(&self) -> bool;
}

/// Cosine similarity between two unit-normalized vectors.
///
/// With normalized inputs this is just the dot product; callers that hold
/// raw vectors should normalize first.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vector dimensions must match");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_of_identical_unit_vectors() {
        let v = vec![0.6, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_of_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_error_retryability() {
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(EmbeddingError::service_unavailable("down").is_retryable());
        assert!(!EmbeddingError::EmptyInput.is_retryable());
        assert!(!EmbeddingError::invalid_response("bad").is_retryable());
    }
}
