//! Store initialization: rehydrating state from persistence.

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result, Warning};
use crate::index::EntryType;
use crate::types::AdaptationPolicy;

use super::MemoryStore;

/// Result of [`MemoryStore::initialize`].
#[derive(Debug, Default)]
pub struct InitOutcome {
    /// Number of interactions rehydrated into memory
    pub loaded: usize,
    /// Quarantined snapshots, adapted embeddings, skipped rows
    pub warnings: Vec<Warning>,
}

impl MemoryStore {
    /// Load all interactions from persistence and rebuild the concept and
    /// vector indexes.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` when the backend cannot be reached;
    /// `DimensionMismatch` when a persisted embedding length disagrees with
    /// the configured dimension under the `strict` policy.
    pub async fn initialize(&self) -> Result<InitOutcome> {
        self.initialize_cancellable(CancellationToken::new()).await
    }

    /// [`initialize`](Self::initialize) with a cancellation signal.
    ///
    /// # Errors
    ///
    /// As [`initialize`](Self::initialize), plus `Cancelled`.
    #[instrument(skip(self, cancel))]
    pub async fn initialize_cancellable(&self, cancel: CancellationToken) -> Result<InitOutcome> {
        let loaded = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = self.storage.load_all() => outcome?,
        };
        let mut warnings = loaded.warnings;

        let mut state = self.state.write().await;
        state.clear();
        self.index.clear();

        let dimension = self.config.dimension;
        let mut count = 0usize;
        for mut interaction in loaded.interactions {
            if state.contains(&interaction.id) {
                warn!(id = %interaction.id, "duplicate interaction id in persistence, keeping first");
                warnings.push(Warning::Degraded {
                    reason: format!("duplicate persisted id {} skipped", interaction.id),
                });
                continue;
            }

            if interaction.embedding.len() != dimension {
                match self.config.vector.adaptation_policy {
                    AdaptationPolicy::Strict => {
                        return Err(Error::DimensionMismatch {
                            expected: dimension,
                            actual: interaction.embedding.len(),
                        });
                    }
                    AdaptationPolicy::Adapt => {
                        let from = interaction.embedding.len();
                        interaction.embedding.resize(dimension, 0.0);
                        warnings.push(Warning::DimensionAdapted {
                            id: interaction.id.clone(),
                            from,
                            to: dimension,
                        });
                    }
                }
            }

            // The index keeps its own normalised copy; a row it rejects
            // (zero-norm or non-finite) is unusable and skipped rather than
            // failing the whole load.
            if let Err(err) =
                self.index
                    .add(&interaction.id, &interaction.embedding, EntryType::Interaction)
            {
                warn!(id = %interaction.id, error = %err, "skipping unindexable persisted interaction");
                warnings.push(Warning::Degraded {
                    reason: format!("persisted interaction {} not indexable: {err}", interaction.id),
                });
                continue;
            }

            state.concepts.index_interaction(&interaction);
            state.insert(interaction);
            count += 1;
        }

        info!(loaded = count, warnings = warnings.len(), "memory store initialized");
        Ok(InitOutcome {
            loaded: count,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::Interaction;
    use crate::storage::{MemoryBackend, StorageBackend};
    use crate::store::RememberRequest;
    use crate::types::{MemoryConfig, VectorSettings};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn config(dimension: usize) -> MemoryConfig {
        MemoryConfig::new(dimension)
    }

    async fn backend_with(interactions: Vec<Interaction>) -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        for interaction in &interactions {
            backend.append(interaction).await.unwrap();
        }
        backend
    }

    fn persisted(id: &str, embedding: Vec<f32>, timestamp: i64) -> Interaction {
        let mut i = Interaction::new(
            id.into(),
            "p".into(),
            "r".into(),
            embedding,
            vec!["topic".into()],
            BTreeMap::new(),
        );
        i.timestamp = timestamp;
        i
    }

    #[tokio::test]
    async fn test_initialize_empty_backend() {
        let store = MemoryStore::builder(config(4)).build().unwrap();
        let outcome = store.initialize().await.unwrap();
        assert_eq!(outcome.loaded, 0);
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_initialize_rehydrates_all_fields() {
        let backend = backend_with(vec![
            persisted("a", vec![1.0, 0.0, 0.0, 0.0], 100),
            persisted("b", vec![0.0, 1.0, 0.0, 0.0], 200),
        ])
        .await;
        let store = MemoryStore::builder(config(4))
            .with_storage(backend)
            .build()
            .unwrap();

        let outcome = store.initialize().await.unwrap();
        assert_eq!(outcome.loaded, 2);
        assert_eq!(store.index().size(), 2);
        assert_eq!(store.find_by_concept("topic").await.len(), 2);
    }

    #[tokio::test]
    async fn test_adapt_policy_pads_short_persisted_embedding() {
        let backend = backend_with(vec![persisted("a", vec![1.0, 0.0, 0.0], 100)]).await;
        let store = MemoryStore::builder(config(4))
            .with_storage(backend)
            .build()
            .unwrap();

        let outcome = store.initialize().await.unwrap();
        assert_eq!(outcome.loaded, 1);
        assert!(matches!(
            outcome.warnings.as_slice(),
            [Warning::DimensionAdapted { from: 3, to: 4, .. }]
        ));

        // The padded embedding is searchable with its original direction.
        let recalled = store
            .recall(&[1.0, 0.0, 0.0, 0.0], crate::store::RecallOptions::default())
            .await
            .unwrap();
        assert_eq!(recalled.interactions.len(), 1);
        assert_eq!(recalled.interactions[0].interaction.embedding.len(), 4);
    }

    #[tokio::test]
    async fn test_strict_policy_rejects_mismatched_persisted_embedding() {
        let backend = backend_with(vec![persisted("a", vec![1.0, 0.0, 0.0], 100)]).await;
        let mut cfg = config(4);
        cfg.vector = VectorSettings {
            adaptation_policy: crate::types::AdaptationPolicy::Strict,
            ..VectorSettings::default()
        };
        let store = MemoryStore::builder(cfg).with_storage(backend).build().unwrap();

        assert!(matches!(
            store.initialize().await,
            Err(Error::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_initialize_skips_zero_norm_rows() {
        let backend = backend_with(vec![
            persisted("good", vec![1.0, 0.0, 0.0, 0.0], 100),
            persisted("bad", vec![0.0, 0.0, 0.0, 0.0], 200),
        ])
        .await;
        let store = MemoryStore::builder(config(4))
            .with_storage(backend)
            .build()
            .unwrap();

        let outcome = store.initialize().await.unwrap();
        assert_eq!(outcome.loaded, 1);
        assert!(matches!(
            outcome.warnings.as_slice(),
            [Warning::Degraded { .. }]
        ));
    }

    #[tokio::test]
    async fn test_initialize_twice_is_idempotent() {
        let store = MemoryStore::builder(config(4)).build().unwrap();
        store.initialize().await.unwrap();
        store
            .remember(RememberRequest::new(
                "p",
                "r",
                vec![1.0, 0.0, 0.0, 0.0],
                vec![],
            ))
            .await
            .unwrap();

        let outcome = store.initialize().await.unwrap();
        assert_eq!(outcome.loaded, 1);
        assert_eq!(store.index().size(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_initialize() {
        let store = MemoryStore::builder(config(4)).build().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            store.initialize_cancellable(token).await,
            Err(Error::Cancelled)
        ));
    }
}
