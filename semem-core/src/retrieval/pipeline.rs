//! Candidate gathering and ranking.
//!
//! The pipeline oversamples the vector index so post-filtering (threshold,
//! concepts, age) does not starve the caller's `k`, then ranks by the fused
//! score with deterministic tie-breaks.

use crate::error::{Error, Result};
use crate::index::{SearchHit, SearchOptions, VectorIndex};
use crate::types::RetrievalSettings;

/// Raw candidates from the index with a degradation marker.
#[derive(Debug, Default)]
pub(crate) struct Candidates {
    pub hits: Vec<SearchHit>,
    /// True when the index failed and concept-only fallback should run
    pub partial: bool,
}

/// How many raw candidates to request for a caller-facing `k`.
pub(crate) fn raw_candidate_count(k: usize, settings: &RetrievalSettings) -> usize {
    k.saturating_mul(settings.oversample.max(1))
        .max(k.saturating_add(settings.buffer))
}

/// Fetch raw candidates and drop everything below the similarity threshold.
///
/// Caller-input errors (malformed query vector) propagate; internal index
/// failures degrade to an empty, `partial` candidate set so recall can fall
/// back to concept-only ranking.
pub(crate) fn gather_candidates(
    index: &VectorIndex,
    query: &[f32],
    k: usize,
    threshold: f32,
    settings: &RetrievalSettings,
) -> Result<Candidates> {
    let k_raw = raw_candidate_count(k, settings);
    match index.search(query, k_raw, &SearchOptions::default()) {
        Ok(hits) => Ok(Candidates {
            hits: hits
                .into_iter()
                .filter(|hit| hit.similarity.clamp(0.0, 1.0) + 1e-6 >= threshold)
                .collect(),
            partial: false,
        }),
        Err(
            err @ (Error::InvalidArgument(_)
            | Error::DimensionMismatch { .. }
            | Error::InvalidVector(_)),
        ) => Err(err),
        Err(err) => {
            tracing::warn!(error = %err, "vector index unavailable, degrading to concept-only recall");
            Ok(Candidates {
                hits: Vec::new(),
                partial: true,
            })
        }
    }
}

/// A candidate carrying everything the final ordering needs.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RankedCandidate {
    pub id: String,
    pub similarity: f32,
    pub score: f32,
    pub timestamp: i64,
}

/// Sort by score descending; ties break by larger timestamp, then
/// lexicographic id.
pub(crate) fn rank(candidates: &mut [RankedCandidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
            .then_with(|| a.id.cmp(&b.id))
    });
}
