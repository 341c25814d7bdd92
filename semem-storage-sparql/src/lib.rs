#![allow(clippy::missing_errors_doc)]

//! # SPARQL graph storage backend
//!
//! Persists interactions as RDF resources in a named graph served by a
//! SPARQL 1.1 Query/Update endpoint pair, with an optional caching
//! decorator.
//!
//! ## Layout
//!
//! - [`SparqlConfig`] — endpoint pair, named graph, vocabulary namespace,
//!   Basic auth, timeouts, retry budget
//! - [`SparqlClient`] — HTTP transport with retry/backoff and sanitised
//!   errors
//! - [`SparqlStore`] — the [`StorageBackend`](semem_core::StorageBackend)
//!   implementation mapping interactions onto the graph
//! - [`CachedSparqlStore`] — LRU + TTL query-result cache with coarse
//!   write invalidation and a background sweeper
//!
//! Query and update text lives in external `.rq` templates under
//! `templates/`, addressed by logical name; see [`templates`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use semem_storage_sparql::{CacheConfig, CachedSparqlStore, SparqlConfig, SparqlStore};
//!
//! # fn main() -> semem_core::Result<()> {
//! let config = SparqlConfig::new(
//!     "http://localhost:3030/memory/query",
//!     "http://localhost:3030/memory/update",
//! )
//! .with_graph("http://example.org/semem/memory")
//! .with_auth("admin", "secret");
//!
//! let store = Arc::new(SparqlStore::new(config)?);
//! let cached = CachedSparqlStore::new(store, CacheConfig::default());
//! # let _ = cached;
//! # Ok(())
//! # }
//! ```

mod cache;
mod client;
mod config;
mod store;

pub mod results;
pub mod templates;

pub use cache::{CacheConfig, CacheMetrics, CachedSparqlStore};
pub use client::SparqlClient;
pub use config::{BasicAuth, SparqlConfig};
pub use store::SparqlStore;
