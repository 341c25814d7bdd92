//! In-process storage backend.
//!
//! Keeps interactions in a mutex-guarded table. Used by tests and as the
//! default when a store is built without a durable backend; everything is
//! lost when the process exits.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::interaction::Interaction;

use super::{LoadOutcome, QueryRows, StorageBackend};

/// Volatile in-process backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    interactions: Mutex<HashMap<String, Interaction>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored interactions.
    pub async fn len(&self) -> usize {
        self.interactions.lock().await.len()
    }

    /// Whether the backend holds no interactions.
    pub async fn is_empty(&self) -> bool {
        self.interactions.lock().await.is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn load_all(&self) -> Result<LoadOutcome> {
        let interactions = self.interactions.lock().await;
        let mut all: Vec<Interaction> = interactions.values().cloned().collect();
        all.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(LoadOutcome {
            interactions: all,
            warnings: Vec::new(),
        })
    }

    async fn append(&self, interaction: &Interaction) -> Result<()> {
        let mut interactions = self.interactions.lock().await;
        if interactions.contains_key(&interaction.id) {
            return Err(Error::Conflict(format!(
                "interaction {} already stored",
                interaction.id
            )));
        }
        interactions.insert(interaction.id.clone(), interaction.clone());
        Ok(())
    }

    async fn update(&self, interaction: &Interaction) -> Result<()> {
        let mut interactions = self.interactions.lock().await;
        match interactions.get_mut(&interaction.id) {
            Some(stored) => {
                *stored = interaction.clone();
                Ok(())
            }
            None => Err(Error::NotFound(interaction.id.clone())),
        }
    }

    async fn query(&self, _query: &str) -> Result<QueryRows> {
        Err(Error::InvalidArgument(
            "the in-memory backend has no query language".into(),
        ))
    }

    async fn delete_all(&self) -> Result<()> {
        self.interactions.lock().await.clear();
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
