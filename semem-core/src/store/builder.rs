//! Store construction.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::Result;
use crate::index::VectorIndex;
use crate::storage::{MemoryBackend, StorageBackend};
use crate::types::MemoryConfig;

use super::{MemoryStore, StoreState};

/// Builder for [`MemoryStore`].
///
/// Configuration is validated at [`build`](Self::build); configuration
/// errors are fatal there rather than surfacing later mid-operation.
pub struct MemoryStoreBuilder {
    config: MemoryConfig,
    storage: Option<Arc<dyn StorageBackend>>,
}

impl MemoryStoreBuilder {
    /// Start a builder with the given configuration.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            storage: None,
        }
    }

    /// Use a durable storage backend. Without one the store runs on the
    /// volatile in-process backend.
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Validate the configuration and construct the store.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when the configuration is invalid.
    pub fn build(self) -> Result<MemoryStore> {
        self.config.validate()?;
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryBackend::new()));
        let index = VectorIndex::new(self.config.dimension, self.config.vector);

        Ok(MemoryStore {
            config: self.config,
            state: RwLock::new(StoreState::default()),
            index,
            storage,
        })
    }
}
