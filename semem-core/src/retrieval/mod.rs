//! Retrieval pipeline: oversampled candidate fetch and fused ranking.

pub mod scoring;

pub(crate) mod pipeline;

pub use scoring::{
    access_component, clamp_similarity, concept_overlap, fused_score, normalize_concepts,
    recency_component,
};
