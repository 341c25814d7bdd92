//! Interaction records and their bookkeeping fields.
//!
//! An [`Interaction`] is one stored (prompt, response) pair with its
//! embedding, extracted concepts, and retrieval bookkeeping. Serialized
//! field names follow the persisted camelCase layout; fields this version
//! does not understand are preserved across round-trips in `extra`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage tier of an interaction.
///
/// New interactions start in [`Tier::Short`]; repeated recall hits promote
/// them to [`Tier::Long`]. Tiers only affect bookkeeping, ids are
/// tier-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Recently stored, not yet reinforced.
    Short,
    /// Promoted after reaching the configured access threshold.
    Long,
}

/// Opaque scalar metadata attached to an interaction (pass-through).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean flag
    Bool(bool),
    /// Numeric value
    Number(f64),
    /// Free-form string
    String(String),
}

/// Milliseconds since the Unix epoch, the engine's timestamp convention.
#[must_use]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// A stored (prompt, response) pair with embedding, concepts, and retrieval
/// bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// Stable unique identifier (UUID string or caller-provided URI)
    pub id: String,
    /// User text
    pub prompt: String,
    /// Assistant text
    pub response: String,
    /// Fixed-length embedding; length equals the configured dimension
    pub embedding: Vec<f32>,
    /// Concept labels, case-preserved but deduplicated case-insensitively
    pub concepts: Vec<String>,
    /// Creation instant, milliseconds since epoch
    pub timestamp: i64,
    /// Number of times this interaction was returned from recall
    pub access_count: u32,
    /// Instant of the most recent retrieval, milliseconds since epoch
    pub last_accessed: i64,
    /// Bounded reinforcement multiplier in `(0, 1]`
    pub decay_factor: f32,
    /// Current storage tier
    pub tier: Tier,
    /// Pass-through scalar metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, MetadataValue>,
    /// Unknown fields preserved across serialization round-trips
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Interaction {
    /// Create a new short-tier interaction stamped with the current time.
    ///
    /// Duplicate concepts are folded case-insensitively, keeping the first
    /// spelling seen.
    #[must_use]
    pub fn new(
        id: String,
        prompt: String,
        response: String,
        embedding: Vec<f32>,
        concepts: Vec<String>,
        metadata: BTreeMap<String, MetadataValue>,
    ) -> Self {
        let now = now_ms();
        Self {
            id,
            prompt,
            response,
            embedding,
            concepts: fold_concepts(concepts),
            timestamp: now,
            access_count: 0,
            last_accessed: now,
            decay_factor: 1.0,
            tier: Tier::Short,
            metadata,
            extra: BTreeMap::new(),
        }
    }

    /// Creation instant as a `chrono` timestamp.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Age relative to `now_ms`, never negative.
    #[must_use]
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.timestamp).max(0)
    }

    /// Apply access reinforcement: bump the access count, refresh the last
    /// accessed instant, and multiply the decay factor (capped at 1.0).
    pub fn touch(&mut self, now_ms: i64, reinforcement: f32) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = self.last_accessed.max(now_ms);
        self.decay_factor = (self.decay_factor * reinforcement).min(1.0);
    }

    /// Multiply the decay factor downward. The factor stays strictly
    /// positive.
    pub fn apply_decay(&mut self, factor: f32) {
        self.decay_factor = (self.decay_factor * factor).clamp(f32::MIN_POSITIVE, 1.0);
    }

    /// Move to the long-term tier and apply the promotion boost (capped at
    /// 1.0).
    pub fn promote(&mut self, boost: f32) {
        self.tier = Tier::Long;
        self.decay_factor = (self.decay_factor * boost).min(1.0);
    }

    /// Check structural invariants against the configured dimension.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty id or non-finite embedding
    /// component, `DimensionMismatch` for a wrong-length embedding.
    pub fn validate(&self, dimension: usize) -> crate::Result<()> {
        if self.id.is_empty() {
            return Err(crate::Error::InvalidArgument(
                "interaction id must not be empty".into(),
            ));
        }
        if self.embedding.len() != dimension {
            return Err(crate::Error::DimensionMismatch {
                expected: dimension,
                actual: self.embedding.len(),
            });
        }
        if self.embedding.iter().any(|v| !v.is_finite()) {
            return Err(crate::Error::InvalidArgument(format!(
                "embedding for {} contains a non-finite component",
                self.id
            )));
        }
        Ok(())
    }
}

/// Deduplicate concepts case-insensitively, preserving first-seen spelling
/// and order.
#[must_use]
pub fn fold_concepts(concepts: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    concepts
        .into_iter()
        .filter_map(|c| {
            let trimmed = c.trim();
            if trimmed.is_empty() {
                return None;
            }
            seen.insert(trimmed.to_lowercase())
                .then(|| trimmed.to_string())
        })
        .collect()
}
