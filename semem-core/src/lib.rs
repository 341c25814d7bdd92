#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::float_cmp)]

//! # Semem Core
//!
//! Semantic-memory engine for conversational agents: persists
//! (prompt, response) interactions with vector embeddings and extracted
//! concepts, and retrieves them by fused semantic similarity, decayed
//! recency, access reinforcement, and concept overlap.
//!
//! ## Core Concepts
//!
//! - **Interactions**: stored (prompt, response) pairs with embedding,
//!   concepts, and retrieval bookkeeping
//! - **Tiers**: short-term and long-term tables; access-driven promotion
//! - **Concepts**: case-insensitive labels enabling symbolic lookup
//! - **Fused scoring**: similarity, recency, access, and concept overlap
//!   combined under configurable weights, minus a decay penalty
//!
//! ## Module Organization
//!
//! ### Primary APIs
//! - [`store`]: the memory store (remember, recall, tiering, snapshots)
//! - [`index`]: approximate nearest-neighbour search over cosine similarity
//! - [`engine`]: facade binding the host's embedding/chat providers
//! - [`context`]: token-budgeted context building and chunking
//!
//! ### Support Modules
//! - [`storage`]: the `StorageBackend` trait and in-process backend
//! - [`retrieval`]: candidate gathering and fused scoring
//! - [`snapshot`]: the versioned export/import format
//! - [`types`]: configuration structs
//! - [`error`]: error and warning types
//!
//! ## Quick Start
//!
//! ```
//! use semem_core::store::{MemoryStore, RecallOptions, RememberRequest};
//! use semem_core::types::MemoryConfig;
//!
//! #[tokio::main]
//! async fn main() -> semem_core::Result<()> {
//!     let store = MemoryStore::builder(MemoryConfig::new(4)).build()?;
//!     store.initialize().await?;
//!
//!     store
//!         .remember(RememberRequest::new(
//!             "hi",
//!             "hello",
//!             vec![1.0, 0.0, 0.0, 0.0],
//!             vec!["greeting".into()],
//!         ))
//!         .await?;
//!
//!     let recalled = store
//!         .recall(
//!             &[1.0, 0.0, 0.0, 0.0],
//!             RecallOptions::default().with_k(1).with_threshold(0.5),
//!         )
//!         .await?;
//!     assert_eq!(recalled.interactions.len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! ## Durable Backends
//!
//! The store persists through the [`storage::StorageBackend`] trait. The
//! `semem-storage-json` crate provides a single-file snapshot backend and
//! `semem-storage-sparql` a SPARQL 1.1 graph backend with a caching
//! decorator; the in-process [`storage::MemoryBackend`] backs tests and
//! no-persistence deployments.

pub mod concept;
pub mod constants;
pub mod context;
pub mod engine;
pub mod error;
pub mod index;
pub mod interaction;
pub mod providers;
pub mod retrieval;
pub mod snapshot;
pub mod storage;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use context::{ChunkOptions, ContextOptions, ContextWindowManager, TokenEstimator, chunk};
pub use engine::SememEngine;
pub use error::{Error, Result, Warning};
pub use index::{EntryType, SearchHit, SearchOptions, VectorIndex};
pub use interaction::{Interaction, MetadataValue, Tier};
pub use providers::{ChatProvider, EmbeddingProvider};
pub use snapshot::Snapshot;
pub use storage::{LoadOutcome, MemoryBackend, QueryRows, StorageBackend};
pub use store::{
    ImportOutcome, InitOutcome, MemoryStore, MemoryStoreBuilder, RecallOptions, RecallOutcome,
    RememberRequest, ScoredInteraction, StoreStats,
};
pub use types::{
    AdaptationPolicy, ContextSettings, MemoryConfig, MemorySettings, RetrievalSettings,
    ScoringWeights, VectorSettings,
};
