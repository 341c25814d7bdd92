//! Fused relevance scoring.
//!
//! Combines clamped cosine similarity, exponential recency decay, saturating
//! access reinforcement, and concept overlap, minus the decay penalty:
//!
//! ```text
//! score = w_s*s + w_r*recency + w_a*access + w_c*concept - (1 - decay_factor)
//! ```
//!
//! All component values live in `[0, 1]`; the penalty is additive and can
//! push a neglected interaction's score negative, which is intentional.

use std::collections::BTreeSet;

use crate::concept::normalize;
use crate::interaction::Interaction;
use crate::types::{MemorySettings, ScoringWeights};

/// Clamp a raw cosine similarity from `[-1, 1]` into ranking range `[0, 1]`.
#[must_use]
pub fn clamp_similarity(similarity: f32) -> f32 {
    similarity.clamp(0.0, 1.0)
}

/// Exponentially decayed recency: `exp(-(now - last_accessed) / tau)`.
#[must_use]
pub fn recency_component(now_ms: i64, last_accessed_ms: i64, tau_ms: i64) -> f32 {
    let age = (now_ms - last_accessed_ms).max(0) as f64;
    (-age / tau_ms.max(1) as f64).exp() as f32
}

/// Saturating access reinforcement: `1 - exp(-access_count / kappa)`.
#[must_use]
pub fn access_component(access_count: u32, kappa: f32) -> f32 {
    1.0 - (-f64::from(access_count) / f64::from(kappa.max(f32::MIN_POSITIVE))).exp() as f32
}

/// Jaccard overlap between a normalised query concept set and an
/// interaction's concepts.
#[must_use]
pub fn concept_overlap(query: &BTreeSet<String>, interaction: &Interaction) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    let theirs: BTreeSet<String> = interaction.concepts.iter().map(|c| normalize(c)).collect();
    let intersection = query.intersection(&theirs).count();
    let union = query.union(&theirs).count();
    intersection as f32 / union.max(1) as f32
}

/// Normalise a raw concept list into the query set used for overlap scoring.
#[must_use]
pub fn normalize_concepts(concepts: &[String]) -> BTreeSet<String> {
    concepts
        .iter()
        .map(|c| normalize(c))
        .filter(|c| !c.is_empty())
        .collect()
}

/// The full fused score for one candidate.
#[must_use]
pub fn fused_score(
    interaction: &Interaction,
    similarity: f32,
    query_concepts: &BTreeSet<String>,
    now_ms: i64,
    weights: &ScoringWeights,
    settings: &MemorySettings,
) -> f32 {
    let s = clamp_similarity(similarity);
    let recency = recency_component(now_ms, interaction.last_accessed, settings.decay_tau_ms);
    let access = access_component(interaction.access_count, settings.access_kappa);
    let concept = concept_overlap(query_concepts, interaction);

    weights.similarity * s
        + weights.recency * recency
        + weights.access * access
        + weights.concept * concept
        - (1.0 - interaction.decay_factor)
}
