//! Storage abstraction for durable interaction persistence.
//!
//! One async trait covers every backend: the JSON snapshot file, the SPARQL
//! graph store, and the in-process [`MemoryBackend`] used in tests and
//! no-persistence deployments. The memory store calls backends through this
//! trait only and assumes all calls on one adapter instance are serialised
//! internally.

pub mod memory;

use async_trait::async_trait;

use crate::error::{Result, Warning};
use crate::interaction::Interaction;

pub use memory::MemoryBackend;

/// Result of a bulk load, with any degradations encountered on the way.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// All persisted interactions, ordered by timestamp ascending
    pub interactions: Vec<Interaction>,
    /// Non-fatal conditions (quarantined snapshots, adapted embeddings)
    pub warnings: Vec<Warning>,
}

/// Opaque rows returned by backend pass-through queries.
pub type QueryRows = Vec<serde_json::Map<String, serde_json::Value>>;

/// Unified storage backend trait.
///
/// All operations are async; synchronous backends bridge via
/// `spawn_blocking`. Implementations serialise their own calls: at most one
/// in-flight update per adapter instance.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Load every persisted interaction, ordered by timestamp ascending.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` when the backing store cannot be
    /// reached. Recoverable snapshot corruption is reported as a warning in
    /// the outcome, not an error.
    async fn load_all(&self) -> Result<LoadOutcome>;

    /// Append a new interaction.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailed` when the store rejects the write, or a
    /// transport error kind when it cannot be reached.
    async fn append(&self, interaction: &Interaction) -> Result<()>;

    /// Write back bookkeeping changes (access count, decay, tier) for an
    /// existing interaction. May be batched by the backend.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, otherwise as [`append`].
    ///
    /// [`append`]: StorageBackend::append
    async fn update(&self, interaction: &Interaction) -> Result<()>;

    /// Opaque query pass-through for external consumers. Backends without a
    /// query language reject with `InvalidArgument`.
    ///
    /// # Errors
    ///
    /// Backend-specific; see the backend crate.
    async fn query(&self, query: &str) -> Result<QueryRows>;

    /// Remove every persisted interaction. Exists for external operator
    /// surfaces; the engine itself never evicts.
    ///
    /// # Errors
    ///
    /// As [`append`](StorageBackend::append).
    async fn delete_all(&self) -> Result<()>;

    /// Flush any buffered writes to durable storage.
    ///
    /// # Errors
    ///
    /// As [`append`](StorageBackend::append).
    async fn flush(&self) -> Result<()>;

    /// Flush and release the backend. Further calls may fail.
    ///
    /// # Errors
    ///
    /// As [`append`](StorageBackend::append).
    async fn close(&self) -> Result<()>;
}
