//! Concept index: normalised concept label → interaction id set.
//!
//! Concepts are compared case-insensitively after trimming. The index is
//! rebuilt from persisted interactions at initialization and kept in lock
//! step with the tier tables afterwards: for every interaction `I` and
//! concept `c ∈ I.concepts`, `I.id` is a member of `entries[normalize(c)]`,
//! and vice versa.

use std::collections::{BTreeSet, HashMap};

use crate::interaction::Interaction;

/// Normalise a concept label for index lookup (trim + lower-case).
#[must_use]
pub fn normalize(concept: &str) -> String {
    concept.trim().to_lowercase()
}

/// Bidirectional concept → interaction-id index.
#[derive(Debug, Default, Clone)]
pub struct ConceptIndex {
    entries: HashMap<String, BTreeSet<String>>,
}

impl ConceptIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one concept for an interaction id.
    pub fn insert(&mut self, concept: &str, id: &str) {
        let key = normalize(concept);
        if key.is_empty() {
            return;
        }
        self.entries.entry(key).or_default().insert(id.to_string());
    }

    /// Register every concept carried by an interaction.
    pub fn index_interaction(&mut self, interaction: &Interaction) {
        for concept in &interaction.concepts {
            self.insert(concept, &interaction.id);
        }
    }

    /// Remove every concept association for an interaction. Empty concept
    /// buckets are dropped.
    pub fn remove_interaction(&mut self, interaction: &Interaction) {
        for concept in &interaction.concepts {
            let key = normalize(concept);
            if let Some(ids) = self.entries.get_mut(&key) {
                ids.remove(&interaction.id);
                if ids.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }

    /// Ids carrying the given concept (normalised lookup), in id order.
    #[must_use]
    pub fn ids_for(&self, concept: &str) -> Vec<String> {
        self.entries
            .get(&normalize(concept))
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether any interaction carries the concept.
    #[must_use]
    pub fn contains(&self, concept: &str) -> bool {
        self.entries.contains_key(&normalize(concept))
    }

    /// Number of distinct normalised concepts.
    #[must_use]
    pub fn concept_count(&self) -> usize {
        self.entries.len()
    }

    /// True when no concept is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
