//! # Test Utilities
//!
//! Shared fixtures for the semem workspace:
//!
//! - Test-output tracing setup
//! - Deterministic mock embedding and chat providers
//! - Interaction and request builders
//! - A storage backend with switchable fault injection

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use semem_core::error::Error;
use semem_core::interaction::Interaction;
use semem_core::providers::{ChatProvider, EmbeddingProvider};
use semem_core::storage::{LoadOutcome, MemoryBackend, QueryRows, StorageBackend};
use semem_core::store::RememberRequest;

/// Install a `tracing` subscriber writing to the test harness, filtered by
/// `RUST_LOG`. Safe to call from every test; only the first call installs.
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Unit vector along one axis, for hand-constructed similarity tests.
#[must_use]
pub fn unit_vector(dimension: usize, axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; dimension];
    if axis < dimension {
        v[axis] = 1.0;
    }
    v
}

/// Build an interaction with fixed texts and the given embedding.
#[must_use]
pub fn test_interaction(id: &str, embedding: Vec<f32>, concepts: &[&str]) -> Interaction {
    Interaction::new(
        id.to_string(),
        format!("prompt for {id}"),
        format!("response for {id}"),
        embedding,
        concepts.iter().map(|c| (*c).to_string()).collect(),
        BTreeMap::new(),
    )
}

/// Build a remember request with fixed texts and the given embedding.
#[must_use]
pub fn test_request(embedding: Vec<f32>, concepts: &[&str]) -> RememberRequest {
    RememberRequest::new(
        "test prompt",
        "test response",
        embedding,
        concepts.iter().map(|c| (*c).to_string()).collect(),
    )
}

/// Deterministic embedding provider: the same text always embeds to the
/// same vector, and different texts land in (almost always) different
/// directions. No model, no network.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbeddings {
    dimension: usize,
}

impl HashEmbeddings {
    /// Provider for the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// The embedding `embed` would return, for assertions.
    #[must_use]
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.1f32; self.dimension];
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
            let slot = (hash % self.dimension as u64) as usize;
            v[slot] += (hash % 97) as f32 / 97.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddings {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Keyword-based chat provider: concepts are the words longer than four
/// characters, responses echo the context length.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordChat;

#[async_trait]
impl ChatProvider for KeywordChat {
    async fn extract_concepts(&self, text: &str) -> anyhow::Result<Vec<String>> {
        Ok(text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 4)
            .map(str::to_lowercase)
            .collect())
    }

    async fn generate_response(&self, prompt: &str, context: &str) -> anyhow::Result<String> {
        Ok(format!(
            "[{} context bytes] reply to: {prompt}",
            context.len()
        ))
    }
}

/// In-memory backend whose appends and updates can be switched to fail,
/// for rollback and degradation tests.
#[derive(Debug, Default)]
pub struct FaultyBackend {
    inner: MemoryBackend,
    fail_appends: AtomicBool,
    fail_updates: AtomicBool,
}

impl FaultyBackend {
    /// A healthy backend; flip the switches to inject faults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent appends fail with `PersistenceFailed`.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent updates fail with `StorageUnavailable`.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageBackend for FaultyBackend {
    async fn load_all(&self) -> semem_core::Result<LoadOutcome> {
        self.inner.load_all().await
    }

    async fn append(&self, interaction: &Interaction) -> semem_core::Result<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(Error::PersistenceFailed("injected append fault".into()));
        }
        self.inner.append(interaction).await
    }

    async fn update(&self, interaction: &Interaction) -> semem_core::Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Error::StorageUnavailable("injected update fault".into()));
        }
        self.inner.update(interaction).await
    }

    async fn query(&self, query: &str) -> semem_core::Result<QueryRows> {
        self.inner.query(query).await
    }

    async fn delete_all(&self) -> semem_core::Result<()> {
        self.inner.delete_all().await
    }

    async fn flush(&self) -> semem_core::Result<()> {
        self.inner.flush().await
    }

    async fn close(&self) -> semem_core::Result<()> {
        self.inner.close().await
    }
}
