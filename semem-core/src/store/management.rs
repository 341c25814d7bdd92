//! Concept lookup, explicit tiering hooks, snapshots, and lifecycle.

use tracing::{info, instrument, warn};

use crate::concept::normalize;
use crate::error::{Error, Result, Warning};
use crate::index::EntryType;
use crate::interaction::Interaction;
use crate::snapshot::Snapshot;
use crate::types::AdaptationPolicy;

use super::MemoryStore;

/// Tier and index sizes, for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Interactions in the short-term table
    pub short_count: usize,
    /// Interactions in the long-term table
    pub long_count: usize,
    /// Distinct normalised concepts
    pub concept_count: usize,
    /// Entries in the vector index (including non-interaction entries)
    pub index_size: usize,
}

/// Result of [`MemoryStore::import_snapshot`].
#[derive(Debug, Default)]
pub struct ImportOutcome {
    /// Number of interactions imported
    pub imported: usize,
    /// Adapted embeddings and skipped rows
    pub warnings: Vec<Warning>,
}

impl MemoryStore {
    /// Every interaction carrying the given concept (case-insensitive),
    /// ordered by creation time.
    pub async fn find_by_concept(&self, concept: &str) -> Vec<Interaction> {
        let state = self.state.read().await;
        let mut found: Vec<Interaction> = state
            .concepts
            .ids_for(&normalize(concept))
            .iter()
            .filter_map(|id| state.get(id).cloned())
            .collect();
        found.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        found
    }

    /// Explicitly move an interaction to the long-term tier. No-op when it
    /// is already there.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    #[instrument(skip(self))]
    pub async fn promote(&self, id: &str) -> Result<()> {
        let updated = {
            let mut state = self.state.write().await;
            if !state.contains(id) {
                return Err(Error::NotFound(id.to_string()));
            }
            state.promote(id, self.config.memory.promotion_boost);
            state.get(id).cloned()
        };
        self.write_back(updated.as_ref()).await;
        Ok(())
    }

    /// Explicitly multiply an interaction's decay factor downward.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidArgument` for a factor outside
    /// `(0, 1]`.
    #[instrument(skip(self))]
    pub async fn decay(&self, id: &str, factor: f32) -> Result<()> {
        if !(factor > 0.0 && factor <= 1.0) || !factor.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "decay factor must be in (0, 1], got {factor}"
            )));
        }
        let updated = {
            let mut state = self.state.write().await;
            let Some(interaction) = state.get_mut(id) else {
                return Err(Error::NotFound(id.to_string()));
            };
            interaction.apply_decay(factor);
            Some(interaction.clone())
        };
        self.write_back(updated.as_ref()).await;
        Ok(())
    }

    /// Serialise the full in-memory state in the JSON backend's file
    /// format.
    ///
    /// # Errors
    ///
    /// `Serialization` when encoding fails.
    pub async fn export_snapshot(&self) -> Result<Vec<u8>> {
        let state = self.state.read().await;
        let mut snapshot = Snapshot::new(self.config.dimension);
        snapshot.interactions = state.all().cloned().collect();
        snapshot.sort();
        snapshot.to_vec()
    }

    /// Replace the store's content with a snapshot: durable state is
    /// cleared, then every snapshot interaction is re-persisted and
    /// rehydrated.
    ///
    /// Not transactional; on persistence failure partway through, in-memory
    /// state is cleared and the error surfaces so the operator can retry.
    ///
    /// # Errors
    ///
    /// `Serialization`/`InvalidArgument` for a malformed snapshot,
    /// `DimensionMismatch` under `strict` when snapshot dimensions disagree,
    /// or the backend's error for persistence failures.
    #[instrument(skip_all, fields(bytes = bytes.len()))]
    pub async fn import_snapshot(&self, bytes: &[u8]) -> Result<ImportOutcome> {
        let mut snapshot = Snapshot::from_slice(bytes)?;
        let dimension = self.config.dimension;
        let mut warnings = Vec::new();

        if snapshot.dimension != dimension
            && self.config.vector.adaptation_policy == AdaptationPolicy::Strict
        {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: snapshot.dimension,
            });
        }
        snapshot.sort();

        let mut state = self.state.write().await;
        self.storage.delete_all().await?;
        state.clear();
        self.index.clear();

        let mut imported = 0usize;
        for mut interaction in snapshot.interactions {
            if interaction.embedding.len() != dimension {
                let from = interaction.embedding.len();
                interaction.embedding.resize(dimension, 0.0);
                warnings.push(Warning::DimensionAdapted {
                    id: interaction.id.clone(),
                    from,
                    to: dimension,
                });
            }
            if let Err(err) =
                self.index
                    .add(&interaction.id, &interaction.embedding, EntryType::Interaction)
            {
                warn!(id = %interaction.id, error = %err, "skipping unindexable snapshot interaction");
                warnings.push(Warning::Degraded {
                    reason: format!("snapshot interaction {} not indexable: {err}", interaction.id),
                });
                continue;
            }
            if let Err(err) = self.storage.append(&interaction).await {
                state.clear();
                self.index.clear();
                return Err(err);
            }
            state.concepts.index_interaction(&interaction);
            state.insert(interaction);
            imported += 1;
        }

        info!(imported, "snapshot imported");
        Ok(ImportOutcome { imported, warnings })
    }

    /// Remove every interaction, durably and in memory. Operator surface;
    /// normal operation never evicts.
    ///
    /// # Errors
    ///
    /// The backend's error when durable deletion fails, in which case
    /// in-memory state is left untouched.
    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> Result<()> {
        let mut state = self.state.write().await;
        self.storage.delete_all().await?;
        state.clear();
        self.index.clear();
        Ok(())
    }

    /// Current tier and index sizes.
    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        StoreStats {
            short_count: state.short.len(),
            long_count: state.long.len(),
            concept_count: state.concepts.concept_count(),
            index_size: self.index.size(),
        }
    }

    /// Flush and release the persistence adapter.
    ///
    /// # Errors
    ///
    /// The backend's error when flushing or closing fails.
    pub async fn dispose(&self) -> Result<()> {
        self.storage.flush().await?;
        self.storage.close().await
    }

    /// Best-effort bookkeeping write-back shared by the explicit hooks.
    async fn write_back(&self, interaction: Option<&Interaction>) {
        if let Some(interaction) = interaction {
            if let Err(err) = self.storage.update(interaction).await {
                warn!(id = %interaction.id, error = %err, "bookkeeping write-back failed");
            }
        }
    }
}
