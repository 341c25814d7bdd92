//! Approximate nearest-neighbour index over cosine similarity.
//!
//! [`VectorIndex`] wraps a layered proximity graph behind one
//! reader-writer lock: `add` and `remove` are writers, `search` is a
//! reader, and a search can never observe a partially applied insert.
//! Vectors are l2-normalised on insertion so cosine similarity reduces to
//! the inner product.
//!
//! Entries carry a type tag so external consumers can index non-interaction
//! embeddings side by side and filter at search time. Ties on similarity
//! break by insertion order (older first), making results deterministic
//! under identical inputs.

mod hnsw;

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, Warning};
use crate::types::{AdaptationPolicy, VectorSettings};
use hnsw::HnswGraph;

/// Closed set of entry type tags.
///
/// Only [`EntryType::Interaction`] is produced by the store itself; the
/// remaining tags exist for external consumers indexing other embedding
/// kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    /// A stored (prompt, response) interaction
    Interaction,
    /// A semantic unit from decomposition pipelines
    Unit,
    /// A named entity
    Entity,
    /// A raw text element
    TextElement,
    /// An attribute node
    Attribute,
    /// A community summary element
    CommunityElement,
}

/// One search result from the index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Entry id
    pub id: String,
    /// Type tag recorded at insertion
    pub entry_type: EntryType,
    /// Cosine similarity with the query, in `[-1, 1]`
    pub similarity: f32,
}

/// Per-search options.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Restrict results to these entry types
    pub types: Option<Vec<EntryType>>,
    /// Override the configured beam width
    pub ef_search: Option<usize>,
}

/// Metadata recorded for an index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Type tag recorded at insertion
    pub entry_type: EntryType,
    /// Monotonic insertion sequence number (search tie-break)
    pub sequence: u64,
    /// Whether the vector was padded or truncated on the way in
    pub dimension_adapted: bool,
}

struct IndexInner {
    graph: HnswGraph,
    meta: HashMap<String, EntryMetadata>,
    next_sequence: u64,
}

/// Fixed-dimension approximate nearest-neighbour index.
///
/// # Examples
///
/// ```
/// use semem_core::index::{EntryType, SearchOptions, VectorIndex};
/// use semem_core::types::VectorSettings;
///
/// let index = VectorIndex::new(4, VectorSettings::default());
/// index
///     .add("a", &[1.0, 0.0, 0.0, 0.0], EntryType::Interaction)
///     .unwrap();
/// let hits = index
///     .search(&[1.0, 0.0, 0.0, 0.0], 1, &SearchOptions::default())
///     .unwrap();
/// assert_eq!(hits[0].id, "a");
/// ```
pub struct VectorIndex {
    dimension: usize,
    settings: VectorSettings,
    inner: RwLock<IndexInner>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimension", &self.dimension)
            .field("size", &self.size())
            .field("settings", &self.settings)
            .finish()
    }
}

impl VectorIndex {
    /// Create an empty index for the given dimension.
    #[must_use]
    pub fn new(dimension: usize, settings: VectorSettings) -> Self {
        Self {
            dimension,
            settings,
            inner: RwLock::new(IndexInner {
                graph: HnswGraph::new(settings.m, settings.ef_construction),
                meta: HashMap::new(),
                next_sequence: 0,
            }),
        }
    }

    /// The configured vector dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Insert a vector. A duplicate id replaces the prior entry (and takes a
    /// fresh insertion sequence number).
    ///
    /// Returns a [`Warning::DimensionAdapted`] when the vector was padded or
    /// truncated under the `adapt` policy.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty id or non-finite component,
    /// `DimensionMismatch` for a wrong-length vector under `strict`,
    /// `InvalidVector` for a zero-norm vector.
    pub fn add(&self, id: &str, vector: &[f32], entry_type: EntryType) -> Result<Option<Warning>> {
        if id.is_empty() {
            return Err(Error::InvalidArgument("entry id must not be empty".into()));
        }
        let (normalized, adapted) = self.prepare(id, vector)?;

        let mut inner = self.inner.write();
        if inner.meta.contains_key(id) {
            inner.graph.remove(id);
        }
        inner.graph.insert(id.to_string(), normalized);
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.meta.insert(
            id.to_string(),
            EntryMetadata {
                entry_type,
                sequence,
                dimension_adapted: adapted,
            },
        );

        Ok(adapted.then(|| Warning::DimensionAdapted {
            id: id.to_string(),
            from: vector.len(),
            to: self.dimension,
        }))
    }

    /// Remove an entry. Returns whether it was present.
    pub fn remove(&self, id: &str) -> bool {
        let mut inner = self.inner.write();
        inner.meta.remove(id);
        inner.graph.remove(id)
    }

    /// Nearest neighbours of `query`, sorted by descending similarity with
    /// ties broken by insertion order (older first).
    ///
    /// An empty index or `k = 0` yields an empty list, never an error.
    ///
    /// # Errors
    ///
    /// Query vectors are validated like inserted ones: `DimensionMismatch`
    /// under `strict`, `InvalidArgument`/`InvalidVector` for malformed input.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let (normalized, _) = self.prepare("query", query)?;

        let inner = self.inner.read();
        if inner.graph.is_empty() {
            return Ok(Vec::new());
        }

        let ef = options.ef_search.unwrap_or(self.settings.ef_search).max(k);
        // Type filtering happens after the graph walk; widen the beam so a
        // sparse type does not starve the result.
        let fetch = if options.types.is_some() {
            ef.max(k.saturating_mul(4))
        } else {
            ef
        };

        let mut hits: Vec<SearchHit> = inner
            .graph
            .search(&normalized, fetch)
            .into_iter()
            .filter_map(|(id, distance)| {
                let meta = inner.meta.get(&id)?;
                if let Some(types) = &options.types {
                    if !types.contains(&meta.entry_type) {
                        return None;
                    }
                }
                Some(SearchHit {
                    id,
                    entry_type: meta.entry_type,
                    similarity: (1.0 - distance).clamp(-1.0, 1.0),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let sa = inner.meta.get(&a.id).map_or(u64::MAX, |m| m.sequence);
                    let sb = inner.meta.get(&b.id).map_or(u64::MAX, |m| m.sequence);
                    sa.cmp(&sb)
                })
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Number of entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.read().graph.len()
    }

    /// Whether the id is indexed.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.inner.read().meta.contains_key(id)
    }

    /// Metadata recorded for an entry.
    #[must_use]
    pub fn metadata(&self, id: &str) -> Option<EntryMetadata> {
        self.inner.read().meta.get(id).copied()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.graph.clear();
        inner.meta.clear();
    }

    /// Validate, adapt, and l2-normalise a vector per the configured policy.
    fn prepare(&self, id: &str, vector: &[f32]) -> Result<(Vec<f32>, bool)> {
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "vector for {id} contains a non-finite component"
            )));
        }

        let (mut adapted, was_adapted) = if vector.len() == self.dimension {
            (vector.to_vec(), false)
        } else {
            match self.settings.adaptation_policy {
                AdaptationPolicy::Strict => {
                    return Err(Error::DimensionMismatch {
                        expected: self.dimension,
                        actual: vector.len(),
                    });
                }
                AdaptationPolicy::Adapt => {
                    let mut v = vector.to_vec();
                    v.resize(self.dimension, 0.0);
                    (v, true)
                }
            }
        };

        let norm: f32 = adapted.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm <= f32::EPSILON {
            return Err(Error::InvalidVector(format!(
                "vector for {id} has zero l2-norm"
            )));
        }
        for v in &mut adapted {
            *v /= norm;
        }
        Ok((adapted, was_adapted))
    }
}
