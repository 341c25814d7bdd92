//! Error and warning types for the semantic memory engine.
//!
//! Errors carry a kind and a human-readable message; recoverable transport
//! failures are marked retriable so callers can apply backoff. Degraded
//! outcomes that do not abort an operation are reported as [`Warning`]
//! values alongside results, never as errors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result type alias for memory operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the semantic memory engine
///
/// Messages never contain SPARQL query text or credentials; backends are
/// responsible for sanitising transport errors before they reach this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input: empty id, non-finite vector component, bad options.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Vector length disagrees with the configured dimension under `strict`
    /// adaptation policy.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension
        expected: usize,
        /// Observed vector length
        actual: usize,
    },

    /// A vector that cannot be normalised (zero l2-norm).
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Backend unreachable or unauthorised.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Write accepted by the transport but rejected by the store.
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    /// Interaction id not present in either tier.
    #[error("Interaction not found: {0}")]
    NotFound(String),

    /// Per-operation timeout elapsed.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Operation aborted by its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// Concurrent writer detected by the backend.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid configuration; fatal at initialization.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error: {0}
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error: {0}
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure inside an embedding or chat provider.
    #[error("Provider error: {0}")]
    Provider(#[from] anyhow::Error),
}

impl Error {
    /// Check whether retrying with backoff may succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::StorageUnavailable(_) | Error::Timeout(_) | Error::Io(_) => true,
            Error::InvalidArgument(_)
            | Error::DimensionMismatch { .. }
            | Error::InvalidVector(_)
            | Error::PersistenceFailed(_)
            | Error::NotFound(_)
            | Error::Cancelled
            | Error::Conflict(_)
            | Error::Configuration(_)
            | Error::Serialization(_)
            | Error::Provider(_) => false,
        }
    }
}

/// Non-fatal conditions surfaced alongside successful results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Warning {
    /// A JSON snapshot failed to parse and was quarantined; the backend
    /// started empty.
    CorruptSnapshotRecovered {
        /// Path the unreadable file was renamed to
        quarantined_to: String,
    },
    /// The operation completed with reduced guarantees.
    Degraded {
        /// What was degraded and why
        reason: String,
    },
    /// A persisted embedding was padded or truncated to the configured
    /// dimension.
    DimensionAdapted {
        /// Affected interaction or entry id
        id: String,
        /// Persisted length
        from: usize,
        /// Configured dimension
        to: usize,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::CorruptSnapshotRecovered { quarantined_to } => {
                write!(f, "corrupt snapshot quarantined to {quarantined_to}")
            }
            Warning::Degraded { reason } => write!(f, "degraded: {reason}"),
            Warning::DimensionAdapted { id, from, to } => {
                write!(f, "embedding for {id} adapted from {from} to {to} dimensions")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_errors() {
        assert!(Error::StorageUnavailable("endpoint down".into()).is_retriable());
        assert!(Error::Timeout(Duration::from_secs(30)).is_retriable());

        assert!(!Error::Cancelled.is_retriable());
        assert!(!Error::PersistenceFailed("rejected".into()).is_retriable());
        assert!(
            !Error::DimensionMismatch {
                expected: 768,
                actual: 767
            }
            .is_retriable()
        );
        assert!(!Error::Configuration("weights do not sum to 1".into()).is_retriable());
    }

    #[test]
    fn test_error_display_carries_context() {
        let err = Error::DimensionMismatch {
            expected: 4,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 4, got 3");
    }

    #[test]
    fn test_warning_display() {
        let warning = Warning::DimensionAdapted {
            id: "abc".into(),
            from: 3,
            to: 4,
        };
        assert!(warning.to_string().contains("3 to 4"));
    }
}
