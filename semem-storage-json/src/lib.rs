#![allow(clippy::missing_errors_doc)]

//! # JSON snapshot storage backend
//!
//! Persists the whole memory state as a single JSON file in the snapshot
//! format defined by `semem-core`. Writes are atomic (write-to-temp then
//! rename); a snapshot that fails to parse on open is quarantined rather
//! than deleted, and the backend starts empty with a
//! [`CorruptSnapshotRecovered`](semem_core::Warning::CorruptSnapshotRecovered)
//! warning.
//!
//! Appends write through immediately, backing the store's durability
//! guarantee. Bookkeeping updates are buffered and flushed when the
//! configured interval elapses, on [`flush`](semem_core::StorageBackend::flush),
//! or on [`close`](semem_core::StorageBackend::close).
//!
//! Exactly one writer process is assumed; cross-process coordination is out
//! of scope.

mod store;

pub use store::{JsonStore, JsonStoreConfig};
