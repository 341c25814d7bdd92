//! High-level facade binding providers to the store.
//!
//! [`SememEngine`] implements the full remember/recall control flows: it
//! embeds text through the host's [`EmbeddingProvider`], extracts concepts
//! through the host's [`ChatProvider`], and delegates storage and retrieval
//! to the [`MemoryStore`]. The `ask` flow additionally builds a
//! token-bounded context from recalled interactions and hands it to the
//! chat provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::context::{ContextOptions, ContextWindowManager};
use crate::error::{Error, Result};
use crate::interaction::MetadataValue;
use crate::providers::{ChatProvider, EmbeddingProvider};
use crate::store::{MemoryStore, RecallOptions, RecallOutcome, RememberRequest};

/// Memory engine facade over a store and the host's model providers.
pub struct SememEngine {
    store: Arc<MemoryStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
    context: ContextWindowManager,
}

impl SememEngine {
    /// Bind a store to its providers.
    ///
    /// # Errors
    ///
    /// `Configuration` when the embedding provider's dimension disagrees
    /// with the store's.
    pub fn new(
        store: Arc<MemoryStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
    ) -> Result<Self> {
        if embeddings.dimension() != store.config().dimension {
            return Err(Error::Configuration(format!(
                "embedding provider dimension {} does not match store dimension {}",
                embeddings.dimension(),
                store.config().dimension
            )));
        }
        let context = ContextWindowManager::from_settings(&store.config().context);
        Ok(Self {
            store,
            embeddings,
            chat,
            context,
        })
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Embed, extract concepts, and persist one (prompt, response) pair.
    ///
    /// # Errors
    ///
    /// `Provider` for embedding or concept-extraction failures, otherwise
    /// as [`MemoryStore::remember`].
    #[instrument(skip_all, fields(prompt_len = prompt.len()))]
    pub async fn remember(
        &self,
        prompt: &str,
        response: &str,
        metadata: BTreeMap<String, MetadataValue>,
    ) -> Result<String> {
        let combined = format!("{prompt}\n{response}");
        let embedding = self.embeddings.embed(&combined).await?;
        let concepts = self.chat.extract_concepts(&combined).await?;
        debug!(concepts = concepts.len(), "concepts extracted");

        let mut request = RememberRequest::new(prompt, response, embedding, concepts);
        request.metadata = metadata;
        self.store.remember(request).await
    }

    /// Embed a query and retrieve the most relevant interactions.
    ///
    /// # Errors
    ///
    /// `Provider` for embedding failures, otherwise as
    /// [`MemoryStore::recall`].
    #[instrument(skip_all, fields(query_len = query.len()))]
    pub async fn recall(&self, query: &str, options: RecallOptions) -> Result<RecallOutcome> {
        let embedding = self.embeddings.embed(query).await?;
        self.store.recall(&embedding, options).await
    }

    /// Answer a prompt with memory: recall, build a token-bounded context,
    /// and generate a response.
    ///
    /// # Errors
    ///
    /// As [`recall`](Self::recall), plus `Provider` when response
    /// generation fails.
    #[instrument(skip_all)]
    pub async fn ask(
        &self,
        prompt: &str,
        recall_options: RecallOptions,
        context_options: &ContextOptions,
    ) -> Result<String> {
        let recalled = self.recall(prompt, recall_options).await?;
        let interactions: Vec<_> = recalled
            .interactions
            .into_iter()
            .map(|scored| scored.interaction)
            .collect();
        let context = self.context.build_context(&interactions, context_options);
        debug!(
            context_len = context.len(),
            sources = interactions.len(),
            "context built"
        );
        Ok(self.chat.generate_response(prompt, &context).await?)
    }
}
