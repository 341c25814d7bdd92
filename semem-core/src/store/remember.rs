//! The write path: validate, insert, index, persist — or roll back.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::index::EntryType;
use crate::interaction::{Interaction, MetadataValue};

use super::MemoryStore;

/// Input to [`MemoryStore::remember`].
#[derive(Debug, Clone)]
pub struct RememberRequest {
    /// User text
    pub prompt: String,
    /// Assistant text
    pub response: String,
    /// Embedding of the pair; length must equal the configured dimension
    pub embedding: Vec<f32>,
    /// Extracted concepts; duplicates are folded case-insensitively
    pub concepts: Vec<String>,
    /// Pass-through scalar metadata
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl RememberRequest {
    /// Build a request without metadata.
    #[must_use]
    pub fn new(
        prompt: impl Into<String>,
        response: impl Into<String>,
        embedding: Vec<f32>,
        concepts: Vec<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
            embedding,
            concepts,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl MemoryStore {
    /// Store a new interaction: short-term table, concept index, vector
    /// index, then durable append.
    ///
    /// On successful return the interaction is both in memory and durable.
    /// On any failure every in-memory mutation is rolled back before the
    /// error surfaces.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` for a wrong-length embedding, `InvalidArgument`
    /// for non-finite components, `InvalidVector` for a zero-norm embedding,
    /// and the backend's error for persistence failures.
    pub async fn remember(&self, request: RememberRequest) -> Result<String> {
        self.remember_cancellable(request, CancellationToken::new())
            .await
    }

    /// [`remember`](Self::remember) with a cancellation signal.
    ///
    /// Cancellation during the persistence append rolls back the in-memory
    /// insertion; a write the backend already acknowledged is not undone
    /// durably.
    ///
    /// # Errors
    ///
    /// As [`remember`](Self::remember), plus `Cancelled`.
    #[instrument(skip_all, fields(prompt_len = request.prompt.len()))]
    pub async fn remember_cancellable(
        &self,
        request: RememberRequest,
        cancel: CancellationToken,
    ) -> Result<String> {
        if request.embedding.len() != self.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                actual: request.embedding.len(),
            });
        }
        if request.embedding.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidArgument(
                "embedding contains a non-finite component".into(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let interaction = Interaction::new(
            id.clone(),
            request.prompt,
            request.response,
            request.embedding,
            request.concepts,
            request.metadata,
        );

        // The writer lock is held across the append so the lock order of
        // concurrent remembers is also their durable order.
        let mut state = self.state.write().await;

        state.concepts.index_interaction(&interaction);
        state.insert(interaction.clone());

        if let Err(err) = self
            .index
            .add(&id, &interaction.embedding, EntryType::Interaction)
        {
            state.remove(&id);
            state.concepts.remove_interaction(&interaction);
            return Err(err);
        }

        let appended = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = self.storage.append(&interaction) => result,
        };

        if let Err(err) = appended {
            state.remove(&id);
            state.concepts.remove_interaction(&interaction);
            self.index.remove(&id);
            return Err(err);
        }

        debug!(id = %id, concepts = interaction.concepts.len(), "interaction remembered");
        Ok(id)
    }
}
