//! Default values shared across the engine.
//!
//! Every constant here is overridable through the corresponding field in
//! [`crate::types::MemoryConfig`]; the defaults match the behaviour of the
//! reference deployment.

/// Access count at which an interaction moves to the long-term tier.
pub const DEFAULT_PROMOTION_THRESHOLD: u32 = 10;

/// Multiplicative reinforcement applied to `decay_factor` on each recall hit.
///
/// The factor is bounded in `(0, 1]`: reinforcement multiplies and caps at
/// 1.0, so the additive score penalty `-(1 - decay_factor)` never becomes a
/// bonus.
pub const DEFAULT_REINFORCEMENT: f32 = 1.05;

/// Multiplicative boost applied to `decay_factor` on promotion (capped at 1.0).
pub const DEFAULT_PROMOTION_BOOST: f32 = 1.2;

/// Time constant for the recency component of the fused score (7 days).
pub const DEFAULT_DECAY_TAU_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Saturation constant for the access-count component of the fused score.
pub const DEFAULT_ACCESS_KAPPA: f32 = 5.0;

/// Default number of results returned by `recall`.
pub const DEFAULT_K: usize = 10;

/// Default similarity threshold; candidates below it are dropped before
/// scoring.
pub const DEFAULT_THRESHOLD: f32 = 0.7;

/// Multiplier on `k` when fetching raw candidates from the vector index.
pub const DEFAULT_OVERSAMPLE: usize = 3;

/// Additive candidate buffer: the pipeline fetches at least `k + buffer`.
pub const DEFAULT_CANDIDATE_BUFFER: usize = 5;

/// Default fused-score weights `(similarity, recency, access, concept)`.
pub const DEFAULT_WEIGHTS: (f32, f32, f32, f32) = (0.6, 0.15, 0.1, 0.15);

/// Maximum neighbour connections per node in the vector index graph.
pub const DEFAULT_HNSW_M: usize = 16;

/// Candidate list size while building the index graph.
pub const DEFAULT_HNSW_EF_CONSTRUCTION: usize = 200;

/// Candidate list size while searching the index graph.
pub const DEFAULT_HNSW_EF_SEARCH: usize = 100;

/// Default token budget for built contexts.
pub const DEFAULT_MAX_TOKENS: usize = 8192;

/// Characters per token assumed by the default estimator.
pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

/// Version tag written into persisted snapshots.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Tolerance used when validating that scoring weights sum to 1.0.
pub const WEIGHT_SUM_TOLERANCE: f32 = 1e-6;
