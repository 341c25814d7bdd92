//! Endpoint-pair configuration.

use std::time::Duration;

use semem_core::error::{Error, Result};
use url::Url;

/// HTTP Basic credentials, injected via configuration. Never echoed into
/// error messages.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    /// User name
    pub user: String,
    /// Password
    pub password: String,
}

/// SPARQL backend configuration.
#[derive(Debug, Clone)]
pub struct SparqlConfig {
    /// SPARQL 1.1 Query endpoint URL
    pub query_endpoint: String,
    /// SPARQL 1.1 Update endpoint URL
    pub update_endpoint: String,
    /// Named graph holding all interactions
    pub graph: String,
    /// Vocabulary namespace for interaction properties
    pub namespace: String,
    /// Optional HTTP Basic credentials
    pub auth: Option<BasicAuth>,
    /// Per-request timeout for queries
    pub query_timeout: Duration,
    /// Per-request timeout for updates
    pub update_timeout: Duration,
    /// Retry budget for idempotent operations on 5xx/timeouts
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt
    pub retry_backoff: Duration,
}

impl SparqlConfig {
    /// Configuration for an endpoint pair with default vocabulary, graph,
    /// timeouts, and retries.
    #[must_use]
    pub fn new(query_endpoint: impl Into<String>, update_endpoint: impl Into<String>) -> Self {
        Self {
            query_endpoint: query_endpoint.into(),
            update_endpoint: update_endpoint.into(),
            graph: "http://example.org/semem/memory".into(),
            namespace: "http://example.org/semem/vocab#".into(),
            auth: None,
            query_timeout: Duration::from_secs(10),
            update_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(250),
        }
    }

    /// Set the named graph URI.
    #[must_use]
    pub fn with_graph(mut self, graph: impl Into<String>) -> Self {
        self.graph = graph.into();
        self
    }

    /// Set the vocabulary namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set Basic auth credentials.
    #[must_use]
    pub fn with_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(BasicAuth {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    /// Validate endpoint and graph URLs.
    ///
    /// # Errors
    ///
    /// `Configuration` for unparseable URLs.
    pub fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("query endpoint", &self.query_endpoint),
            ("update endpoint", &self.update_endpoint),
            ("graph", &self.graph),
            ("namespace", &self.namespace),
        ] {
            Url::parse(value)
                .map_err(|_| Error::Configuration(format!("invalid {label} URL")))?;
        }
        if self.query_timeout.is_zero() || self.update_timeout.is_zero() {
            return Err(Error::Configuration("timeouts must be positive".into()));
        }
        Ok(())
    }
}
