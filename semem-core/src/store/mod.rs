//! The memory store: authoritative in-memory state with durable
//! write-through.
//!
//! [`MemoryStore`] owns the short- and long-term interaction tables and the
//! concept index, composes the vector index, and persists through a
//! [`StorageBackend`]. State is guarded by a single async reader-writer
//! lock; reinforcement updates from `recall` are writes. Lock acquisition
//! order is store state → vector index → persistence adapter, never the
//! reverse.
//!
//! A single process-wide store instance is expected but not enforced.

mod builder;
mod init;
mod management;
mod recall;
mod remember;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::concept::ConceptIndex;
use crate::index::VectorIndex;
use crate::interaction::{Interaction, Tier};
use crate::storage::StorageBackend;
use crate::types::MemoryConfig;

pub use builder::MemoryStoreBuilder;
pub use init::InitOutcome;
pub use management::{ImportOutcome, StoreStats};
pub use recall::{RecallOptions, RecallOutcome, ScoredInteraction};
pub use remember::RememberRequest;

/// Tiered in-memory tables plus the concept index.
///
/// Mutated only under the store's writer lock.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    short: HashMap<String, Interaction>,
    long: HashMap<String, Interaction>,
    concepts: ConceptIndex,
}

impl StoreState {
    fn get(&self, id: &str) -> Option<&Interaction> {
        self.short.get(id).or_else(|| self.long.get(id))
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Interaction> {
        if self.short.contains_key(id) {
            self.short.get_mut(id)
        } else {
            self.long.get_mut(id)
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.short.contains_key(id) || self.long.contains_key(id)
    }

    fn insert(&mut self, interaction: Interaction) {
        match interaction.tier {
            Tier::Short => self.short.insert(interaction.id.clone(), interaction),
            Tier::Long => self.long.insert(interaction.id.clone(), interaction),
        };
    }

    fn remove(&mut self, id: &str) -> Option<Interaction> {
        self.short.remove(id).or_else(|| self.long.remove(id))
    }

    /// Move a short-tier interaction to the long-term table, applying the
    /// promotion boost. Idempotent: promoting a long-tier id is a no-op.
    fn promote(&mut self, id: &str, boost: f32) -> bool {
        match self.short.remove(id) {
            Some(mut interaction) => {
                interaction.promote(boost);
                self.long.insert(id.to_string(), interaction);
                true
            }
            None => false,
        }
    }

    fn all(&self) -> impl Iterator<Item = &Interaction> {
        self.short.values().chain(self.long.values())
    }

    fn len(&self) -> usize {
        self.short.len() + self.long.len()
    }

    fn clear(&mut self) {
        self.short.clear();
        self.long.clear();
        self.concepts.clear();
    }
}

/// Authoritative memory store over a durable backend.
///
/// # Examples
///
/// ```
/// use semem_core::store::{MemoryStore, RememberRequest};
/// use semem_core::types::MemoryConfig;
///
/// # #[tokio::main]
/// # async fn main() -> semem_core::Result<()> {
/// let store = MemoryStore::builder(MemoryConfig::new(4)).build()?;
/// store.initialize().await?;
///
/// let id = store
///     .remember(RememberRequest::new(
///         "hi",
///         "hello",
///         vec![1.0, 0.0, 0.0, 0.0],
///         vec!["greeting".into()],
///     ))
///     .await?;
/// assert!(!id.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct MemoryStore {
    config: MemoryConfig,
    state: RwLock<StoreState>,
    index: VectorIndex,
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("dimension", &self.config.dimension)
            .field("index_size", &self.index.size())
            .finish()
    }
}

impl MemoryStore {
    /// Start building a store for the given configuration.
    #[must_use]
    pub fn builder(config: MemoryConfig) -> MemoryStoreBuilder {
        MemoryStoreBuilder::new(config)
    }

    /// The configuration this store was built with.
    #[must_use]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// The vector index, exposed for consumers indexing non-interaction
    /// embeddings alongside the store's own entries.
    #[must_use]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn interaction(id: &str) -> Interaction {
        Interaction::new(
            id.into(),
            "p".into(),
            "r".into(),
            vec![1.0, 0.0],
            vec!["c".into()],
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_state_promote_moves_between_tables() {
        let mut state = StoreState::default();
        state.insert(interaction("a"));
        assert!(state.short.contains_key("a"));

        assert!(state.promote("a", 1.2));
        assert!(!state.short.contains_key("a"));
        let promoted = state.long.get("a").unwrap();
        assert_eq!(promoted.tier, Tier::Long);

        // Promoting again is a no-op, not a double boost.
        assert!(!state.promote("a", 1.2));
    }

    #[test]
    fn test_state_lookup_spans_both_tiers() {
        let mut state = StoreState::default();
        state.insert(interaction("a"));
        state.promote("a", 1.0);
        assert!(state.contains("a"));
        assert!(state.get("a").is_some());
        assert!(state.get_mut("a").is_some());
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_state_remove_spans_both_tiers() {
        let mut state = StoreState::default();
        state.insert(interaction("a"));
        state.insert(interaction("b"));
        state.promote("a", 1.0);

        assert!(state.remove("a").is_some());
        assert!(state.remove("b").is_some());
        assert!(state.remove("ghost").is_none());
        assert_eq!(state.len(), 0);
    }
}
