//! The read path: candidate fetch, fused ranking, reinforcement.

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result, Warning};
use crate::interaction::{Interaction, Tier, now_ms};
use crate::retrieval::pipeline::{self, RankedCandidate};
use crate::retrieval::scoring;

use super::MemoryStore;

/// Options for [`MemoryStore::recall`]. Unset fields fall back to the
/// configured retrieval defaults.
#[derive(Debug, Clone, Default)]
pub struct RecallOptions {
    /// Maximum number of results
    pub k: Option<usize>,
    /// Minimum clamped similarity for vector candidates
    pub threshold: Option<f32>,
    /// Only interactions created within this window are returned
    pub max_age_ms: Option<i64>,
    /// Results must share a concept with this set; also used as the query
    /// concept set in the fused score
    pub concept_filter: Option<Vec<String>>,
}

impl RecallOptions {
    /// Restrict the number of results.
    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    /// Override the similarity threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Require overlap with the given concepts.
    #[must_use]
    pub fn with_concepts(mut self, concepts: Vec<String>) -> Self {
        self.concept_filter = Some(concepts);
        self
    }

    /// Only return interactions younger than the given age.
    #[must_use]
    pub fn with_max_age_ms(mut self, max_age_ms: i64) -> Self {
        self.max_age_ms = Some(max_age_ms);
        self
    }
}

/// One recall result with its ranking components.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredInteraction {
    /// The interaction, after reinforcement was applied
    pub interaction: Interaction,
    /// Clamped cosine similarity with the query (0 in concept-only fallback)
    pub similarity: f32,
    /// Fused relevance score
    pub score: f32,
}

/// Result of [`MemoryStore::recall`].
#[derive(Debug, Default)]
pub struct RecallOutcome {
    /// Ranked results, best first
    pub interactions: Vec<ScoredInteraction>,
    /// True when the vector index was unavailable and ranking fell back to
    /// concept overlap only
    pub partial: bool,
    /// Degradations encountered (failed write-backs, fallback reasons)
    pub warnings: Vec<Warning>,
}

impl MemoryStore {
    /// Retrieve the most relevant interactions for a query embedding.
    ///
    /// Returned interactions are reinforced: access count incremented, last
    /// accessed refreshed, decay factor multiplied (capped at 1.0), and
    /// short-tier hits reaching the promotion threshold move to the
    /// long-term tier exactly once. Bookkeeping write-back to persistence is
    /// best-effort; failures degrade the outcome instead of failing it.
    ///
    /// An empty store yields an empty outcome, never an error.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a malformed query vector or out-of-range
    /// options; `DimensionMismatch` for a wrong-length query under `strict`.
    pub async fn recall(
        &self,
        query_embedding: &[f32],
        options: RecallOptions,
    ) -> Result<RecallOutcome> {
        self.recall_cancellable(query_embedding, options, CancellationToken::new())
            .await
    }

    /// [`recall`](Self::recall) with a cancellation signal.
    ///
    /// # Errors
    ///
    /// As [`recall`](Self::recall), plus `Cancelled` when the token fires
    /// before results are committed.
    #[instrument(skip_all, fields(k = ?options.k, threshold = ?options.threshold))]
    pub async fn recall_cancellable(
        &self,
        query_embedding: &[f32],
        options: RecallOptions,
        cancel: CancellationToken,
    ) -> Result<RecallOutcome> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let k = options.k.unwrap_or(self.config.retrieval.default_k);
        let threshold = options
            .threshold
            .unwrap_or(self.config.retrieval.default_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidArgument(format!(
                "threshold must be in [0, 1], got {threshold}"
            )));
        }
        if k == 0 {
            return Ok(RecallOutcome::default());
        }

        let query_concepts: BTreeSet<String> = options
            .concept_filter
            .as_deref()
            .map(scoring::normalize_concepts)
            .unwrap_or_default();

        let candidates = pipeline::gather_candidates(
            &self.index,
            query_embedding,
            k,
            threshold,
            &self.config.retrieval,
        )?;

        let now = now_ms();
        let mut warnings = Vec::new();
        if candidates.partial {
            warnings.push(Warning::Degraded {
                reason: "vector index unavailable, ranked by concept overlap only".into(),
            });
        }

        let mut state = self.state.write().await;

        let mut ranked: Vec<RankedCandidate> = if candidates.partial {
            state
                .all()
                .filter(|i| self.passes_filters(i, &query_concepts, options.max_age_ms, now))
                .map(|i| RankedCandidate {
                    id: i.id.clone(),
                    similarity: 0.0,
                    score: scoring::fused_score(
                        i,
                        0.0,
                        &query_concepts,
                        now,
                        &self.config.scoring,
                        &self.config.memory,
                    ),
                    timestamp: i.timestamp,
                })
                .collect()
        } else {
            candidates
                .hits
                .iter()
                .filter_map(|hit| {
                    let interaction = state.get(&hit.id)?;
                    if !self.passes_filters(interaction, &query_concepts, options.max_age_ms, now) {
                        return None;
                    }
                    let similarity = scoring::clamp_similarity(hit.similarity);
                    Some(RankedCandidate {
                        id: hit.id.clone(),
                        similarity,
                        score: scoring::fused_score(
                            interaction,
                            hit.similarity,
                            &query_concepts,
                            now,
                            &self.config.scoring,
                            &self.config.memory,
                        ),
                        timestamp: interaction.timestamp,
                    })
                })
                .collect()
        };

        pipeline::rank(&mut ranked);
        ranked.truncate(k);

        // Reinforcement and at-most-once promotion, under the writer lock.
        let settings = self.config.memory;
        let mut results = Vec::with_capacity(ranked.len());
        let mut updated = Vec::with_capacity(ranked.len());
        for candidate in &ranked {
            let promotion_due = match state.get_mut(&candidate.id) {
                Some(interaction) => {
                    interaction.touch(now, settings.reinforcement);
                    interaction.tier == Tier::Short
                        && interaction.access_count >= settings.promotion_threshold
                }
                None => continue,
            };
            if promotion_due {
                state.promote(&candidate.id, settings.promotion_boost);
                debug!(id = %candidate.id, "interaction promoted to long-term tier");
            }
            if let Some(interaction) = state.get(&candidate.id) {
                updated.push(interaction.clone());
                results.push(ScoredInteraction {
                    interaction: interaction.clone(),
                    similarity: candidate.similarity,
                    score: candidate.score,
                });
            }
        }
        drop(state);

        // Best-effort bookkeeping write-back; a failure degrades the
        // outcome but the results above are already committed in memory.
        let mut write_back_failed = false;
        for interaction in &updated {
            if cancel.is_cancelled() {
                break;
            }
            if let Err(err) = self.storage.update(interaction).await {
                warn!(id = %interaction.id, error = %err, "bookkeeping write-back failed");
                write_back_failed = true;
                break;
            }
        }
        if write_back_failed {
            warnings.push(Warning::Degraded {
                reason: "bookkeeping write-back to persistence failed".into(),
            });
        }

        debug!(
            returned = results.len(),
            partial = candidates.partial,
            "recall complete"
        );
        Ok(RecallOutcome {
            interactions: results,
            partial: candidates.partial,
            warnings,
        })
    }

    fn passes_filters(
        &self,
        interaction: &Interaction,
        query_concepts: &BTreeSet<String>,
        max_age_ms: Option<i64>,
        now: i64,
    ) -> bool {
        if let Some(max_age) = max_age_ms {
            if interaction.age_ms(now) > max_age {
                return false;
            }
        }
        if !query_concepts.is_empty() {
            let overlaps = interaction
                .concepts
                .iter()
                .any(|c| query_concepts.contains(&crate::concept::normalize(c)));
            if !overlaps {
                return false;
            }
        }
        true
    }
}
