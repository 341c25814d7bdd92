//! Configuration types for the memory engine.
//!
//! These are plain structs with `Default` impls; loading them from files or
//! the environment is the host's concern. [`MemoryConfig::validate`] is
//! called at store construction and configuration errors are fatal there.

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Error, Result};

/// Tiering, reinforcement, and decay parameters.
///
/// `decay_factor` is interpreted as a bounded reinforcement in `(0, 1]`:
/// both [`reinforcement`](Self::reinforcement) and
/// [`promotion_boost`](Self::promotion_boost) multiply it and cap at 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Access count at which a short-tier interaction is promoted
    pub promotion_threshold: u32,
    /// Multiplier applied to `decay_factor` on every recall hit
    pub reinforcement: f32,
    /// Multiplier applied to `decay_factor` on promotion
    pub promotion_boost: f32,
    /// Time constant of the recency score component, in milliseconds
    pub decay_tau_ms: i64,
    /// Saturation constant of the access-count score component
    pub access_kappa: f32,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            promotion_threshold: constants::DEFAULT_PROMOTION_THRESHOLD,
            reinforcement: constants::DEFAULT_REINFORCEMENT,
            promotion_boost: constants::DEFAULT_PROMOTION_BOOST,
            decay_tau_ms: constants::DEFAULT_DECAY_TAU_MS,
            access_kappa: constants::DEFAULT_ACCESS_KAPPA,
        }
    }
}

/// Weights of the fused retrieval score.
///
/// All weights are non-negative and sum to 1.0; the decay penalty is applied
/// additively on top and is not part of the sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight of the clamped cosine similarity
    pub similarity: f32,
    /// Weight of the exponential recency component
    pub recency: f32,
    /// Weight of the saturating access-count component
    pub access: f32,
    /// Weight of the concept-overlap (Jaccard) component
    pub concept: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        let (similarity, recency, access, concept) = constants::DEFAULT_WEIGHTS;
        Self {
            similarity,
            recency,
            access,
            concept,
        }
    }
}

impl ScoringWeights {
    fn validate(&self) -> Result<()> {
        let components = [self.similarity, self.recency, self.access, self.concept];
        if components.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Configuration(
                "scoring weights must be finite and non-negative".into(),
            ));
        }
        let sum: f32 = components.iter().sum();
        if (sum - 1.0).abs() > constants::WEIGHT_SUM_TOLERANCE {
            return Err(Error::Configuration(format!(
                "scoring weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Candidate fetch and filtering parameters of the retrieval pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Default number of results when the caller does not specify `k`
    pub default_k: usize,
    /// Default similarity threshold
    pub default_threshold: f32,
    /// Multiplier on `k` when asking the index for raw candidates
    pub oversample: usize,
    /// Additive lower bound: at least `k + buffer` candidates are fetched
    pub buffer: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            default_k: constants::DEFAULT_K,
            default_threshold: constants::DEFAULT_THRESHOLD,
            oversample: constants::DEFAULT_OVERSAMPLE,
            buffer: constants::DEFAULT_CANDIDATE_BUFFER,
        }
    }
}

/// What the vector index does with vectors whose length disagrees with the
/// configured dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdaptationPolicy {
    /// Reject with a dimension-mismatch error.
    Strict,
    /// Zero-pad or truncate, renormalise, and surface a warning.
    Adapt,
}

/// Vector index construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorSettings {
    /// Dimension adaptation policy
    pub adaptation_policy: AdaptationPolicy,
    /// Maximum neighbour connections per graph node
    pub m: usize,
    /// Candidate list size during graph construction
    pub ef_construction: usize,
    /// Candidate list size during search
    pub ef_search: usize,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            adaptation_policy: AdaptationPolicy::Adapt,
            m: constants::DEFAULT_HNSW_M,
            ef_construction: constants::DEFAULT_HNSW_EF_CONSTRUCTION,
            ef_search: constants::DEFAULT_HNSW_EF_SEARCH,
        }
    }
}

/// Context window defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSettings {
    /// Default token budget for built contexts
    pub default_max_tokens: usize,
    /// Characters per token assumed by the default estimator
    pub chars_per_token: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            default_max_tokens: constants::DEFAULT_MAX_TOKENS,
            chars_per_token: constants::DEFAULT_CHARS_PER_TOKEN,
        }
    }
}

/// Top-level engine configuration.
///
/// # Examples
///
/// ```
/// use semem_core::types::MemoryConfig;
///
/// let config = MemoryConfig::new(768);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Embedding vector length; fixed for the lifetime of a store
    pub dimension: usize,
    /// Tiering and decay parameters
    pub memory: MemorySettings,
    /// Fused-score weights
    pub scoring: ScoringWeights,
    /// Retrieval pipeline parameters
    pub retrieval: RetrievalSettings,
    /// Vector index parameters
    pub vector: VectorSettings,
    /// Context window defaults
    pub context: ContextSettings,
}

impl MemoryConfig {
    /// Create a configuration with the given dimension and all other values
    /// at their defaults.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            memory: MemorySettings::default(),
            scoring: ScoringWeights::default(),
            retrieval: RetrievalSettings::default(),
            vector: VectorSettings::default(),
            context: ContextSettings::default(),
        }
    }

    /// Validate the configuration. Called at store construction; any error
    /// here is fatal.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::Configuration("dimension must be positive".into()));
        }
        if self.memory.reinforcement <= 0.0 || !self.memory.reinforcement.is_finite() {
            return Err(Error::Configuration(
                "reinforcement must be a positive finite multiplier".into(),
            ));
        }
        if self.memory.promotion_boost <= 0.0 || !self.memory.promotion_boost.is_finite() {
            return Err(Error::Configuration(
                "promotion boost must be a positive finite multiplier".into(),
            ));
        }
        if self.memory.decay_tau_ms <= 0 {
            return Err(Error::Configuration("decay tau must be positive".into()));
        }
        if self.memory.access_kappa <= 0.0 {
            return Err(Error::Configuration("access kappa must be positive".into()));
        }
        self.scoring.validate()?;
        if !(0.0..=1.0).contains(&self.retrieval.default_threshold) {
            return Err(Error::Configuration(
                "default threshold must be in [0, 1]".into(),
            ));
        }
        if self.retrieval.oversample == 0 {
            return Err(Error::Configuration("oversample must be positive".into()));
        }
        if self.vector.m == 0 || self.vector.ef_construction == 0 || self.vector.ef_search == 0 {
            return Err(Error::Configuration(
                "vector index parameters must be positive".into(),
            ));
        }
        if self.context.chars_per_token == 0 {
            return Err(Error::Configuration(
                "chars per token must be positive".into(),
            ));
        }
        Ok(())
    }
}
