//! Versioned snapshot model.
//!
//! This is both the JSON backend's on-disk file format and the payload of
//! the store's operator-facing export/import surface. Unknown fields at the
//! snapshot and interaction level survive a decode/encode round-trip.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::SNAPSHOT_VERSION;
use crate::error::{Error, Result};
use crate::interaction::Interaction;

/// A complete serialised memory state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version; currently always 1
    pub version: u32,
    /// Embedding dimension the interactions were stored under
    pub dimension: usize,
    /// All interactions, ordered by timestamp ascending
    pub interactions: Vec<Interaction>,
    /// Unknown fields preserved across round-trips
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Snapshot {
    /// Create an empty snapshot for the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            dimension,
            interactions: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Decode a snapshot from bytes.
    ///
    /// # Errors
    ///
    /// `Serialization` for malformed JSON, `InvalidArgument` for an
    /// unsupported version.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let snapshot: Self = serde_json::from_slice(bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::InvalidArgument(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }

    /// Encode to pretty-printed JSON bytes.
    ///
    /// # Errors
    ///
    /// `Serialization` when encoding fails.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Sort interactions into canonical order (timestamp ascending, then id).
    pub fn sort(&mut self) {
        self.interactions
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    }
}
