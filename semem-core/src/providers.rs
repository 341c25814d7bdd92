//! Consumed host interfaces: embeddings and chat.
//!
//! The engine never talks to a model API itself; hosts supply these two
//! traits. Provider failures are aggregated as `anyhow` errors at the seam
//! and surface as [`crate::Error::Provider`].

use async_trait::async_trait;

/// Produces fixed-length embeddings for text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text. The returned vector length must equal
    /// [`dimension`](Self::dimension).
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// The provider's embedding dimension.
    fn dimension(&self) -> usize;
}

/// Chat-model operations the engine consumes.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Extract concept labels from text. An empty result is valid; the
    /// returned set is treated as authoritative.
    async fn extract_concepts(&self, text: &str) -> anyhow::Result<Vec<String>>;

    /// Generate an assistant response for a prompt given retrieved context.
    async fn generate_response(&self, prompt: &str, context: &str) -> anyhow::Result<String>;
}
