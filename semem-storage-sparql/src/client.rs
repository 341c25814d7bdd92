//! HTTP client for the SPARQL endpoint pair.
//!
//! Queries POST to the query endpoint as `application/sparql-query`,
//! updates to the update endpoint as `application/sparql-update`.
//! Idempotent operations retry on 5xx, connect failures, and timeouts with
//! exponential backoff; 4xx responses are fatal. Error messages are
//! sanitised: they carry status codes and operation names, never query
//! text or credentials.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, instrument, warn};

use semem_core::error::{Error, Result};

use crate::config::SparqlConfig;
use crate::results::{AskResult, SparqlResults};

const RESULTS_JSON: &str = "application/sparql-results+json";

/// Low-level transport shared by the store and its cache decorator.
pub struct SparqlClient {
    http: reqwest::Client,
    config: SparqlConfig,
}

impl std::fmt::Debug for SparqlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparqlClient")
            .field("query_endpoint", &self.config.query_endpoint)
            .field("update_endpoint", &self.config.update_endpoint)
            .finish()
    }
}

impl SparqlClient {
    /// Build a client for a validated configuration.
    ///
    /// # Errors
    ///
    /// `Configuration` when the configuration is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(config: SparqlConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|_| Error::Configuration("failed to build HTTP client".into()))?;
        Ok(Self { http, config })
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &SparqlConfig {
        &self.config
    }

    /// Run a `SELECT` query. Always retried: reads are idempotent.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` for unreachable/unauthorised endpoints after
    /// retries, `Timeout` for elapsed deadlines, `InvalidArgument` when the
    /// endpoint rejects the query.
    #[instrument(skip_all)]
    pub async fn select(&self, query: &str) -> Result<SparqlResults> {
        let body = self
            .request_with_retry("query", query, true)
            .await?;
        serde_json::from_slice(&body).map_err(|err| {
            Error::PersistenceFailed(format!("query endpoint returned undecodable results: {err}"))
        })
    }

    /// Run an `ASK` query.
    ///
    /// # Errors
    ///
    /// As [`select`](Self::select).
    pub async fn ask(&self, query: &str) -> Result<bool> {
        let body = self.request_with_retry("query", query, true).await?;
        let ask: AskResult = serde_json::from_slice(&body).map_err(|err| {
            Error::PersistenceFailed(format!("query endpoint returned undecodable results: {err}"))
        })?;
        Ok(ask.boolean)
    }

    /// Run a SPARQL Update. `idempotent` controls whether transport
    /// failures are retried.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable`/`Timeout` for transport failures,
    /// `PersistenceFailed` when the store rejects the update.
    #[instrument(skip_all, fields(idempotent))]
    pub async fn update(&self, update: &str, idempotent: bool) -> Result<()> {
        self.request_with_retry("update", update, idempotent)
            .await?;
        Ok(())
    }

    /// Probe the query endpoint with a trivial `ASK`.
    pub async fn is_available(&self) -> bool {
        match crate::templates::render("ping", &[]) {
            Ok(ping) => self.ask(&ping).await.is_ok(),
            Err(_) => false,
        }
    }

    async fn request_with_retry(
        &self,
        operation: &'static str,
        body: &str,
        idempotent: bool,
    ) -> Result<Vec<u8>> {
        let mut attempt = 0u32;
        loop {
            match self.request_once(operation, body).await {
                Ok(bytes) => return Ok(bytes),
                Err(err)
                    if idempotent && err.is_retriable() && attempt < self.config.max_retries =>
                {
                    let backoff = self.config.retry_backoff * 2u32.saturating_pow(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn request_once(&self, operation: &'static str, body: &str) -> Result<Vec<u8>> {
        let (endpoint, content_type, timeout) = if operation == "update" {
            (
                &self.config.update_endpoint,
                "application/sparql-update",
                self.config.update_timeout,
            )
        } else {
            (
                &self.config.query_endpoint,
                "application/sparql-query",
                self.config.query_timeout,
            )
        };

        let mut request = self
            .http
            .post(endpoint.as_str())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::ACCEPT, RESULTS_JSON)
            .timeout(timeout)
            .body(body.to_string());
        if let Some(auth) = &self.config.auth {
            request = request.basic_auth(&auth.user, Some(&auth.password));
        }

        let response = request
            .send()
            .await
            .map_err(|err| transport_error(operation, &err, timeout))?;
        let status = response.status();
        if status.is_success() {
            debug!(operation, status = status.as_u16(), "sparql request ok");
            let bytes = response
                .bytes()
                .await
                .map_err(|err| transport_error(operation, &err, timeout))?;
            return Ok(bytes.to_vec());
        }

        Err(status_error(operation, status))
    }
}

fn transport_error(operation: &str, err: &reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout(timeout)
    } else {
        // Deliberately drops the source error: reqwest messages can echo
        // request URLs with embedded userinfo.
        Error::StorageUnavailable(format!("sparql {operation} endpoint unreachable"))
    }
}

fn status_error(operation: &str, status: StatusCode) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::StorageUnavailable(format!(
            "sparql {operation} endpoint refused credentials (status {})",
            status.as_u16()
        )),
        status if status.is_client_error() => {
            if operation == "update" {
                Error::PersistenceFailed(format!(
                    "sparql update rejected (status {})",
                    status.as_u16()
                ))
            } else {
                Error::InvalidArgument(format!(
                    "sparql query rejected (status {})",
                    status.as_u16()
                ))
            }
        }
        status => Error::StorageUnavailable(format!(
            "sparql {operation} endpoint error (status {})",
            status.as_u16()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> SparqlClient {
        let mut config = SparqlConfig::new(server.url("/query"), server.url("/update"));
        config.retry_backoff = Duration::from_millis(1);
        SparqlClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_select_decodes_results() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/query")
                    .header("content-type", "application/sparql-query");
                then.status(200).json_body(serde_json::json!({
                    "head": {"vars": ["s"]},
                    "results": {"bindings": [
                        {"s": {"type": "uri", "value": "http://example.org/x"}}
                    ]}
                }));
            })
            .await;

        let client = client_for(&server);
        let results = client.select("SELECT ?s WHERE { ?s ?p ?o }").await.unwrap();
        mock.assert_async().await;
        assert_eq!(results.results.bindings.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_on_server_error_then_success() {
        let server = MockServer::start_async().await;
        let failing = server
            .mock_async(|when, then| {
                when.method(POST).path("/query");
                then.status(503);
            })
            .await;

        let client = client_for(&server);
        let err = client.select("SELECT ?s WHERE { ?s ?p ?o }").await.unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)));
        // Initial attempt plus max_retries.
        assert_eq!(failing.hits_async().await, 4);
    }

    #[tokio::test]
    async fn test_client_error_is_fatal_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/query");
                then.status(400);
            })
            .await;

        let client = client_for(&server);
        let err = client.select("malformed").await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_unauthorized_is_storage_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/update");
                then.status(401);
            })
            .await;

        let client = client_for(&server);
        let err = client.update("INSERT DATA { }", true).await.unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_non_idempotent_update_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/update");
                then.status(500);
            })
            .await;

        let client = client_for(&server);
        let err = client.update("INSERT DATA { }", false).await.unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_update_rejected_is_persistence_failed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/update");
                then.status(400);
            })
            .await;

        let client = client_for(&server);
        let err = client.update("INSERT DATA { }", true).await.unwrap_err();
        assert!(matches!(err, Error::PersistenceFailed(_)));
    }

    #[tokio::test]
    async fn test_basic_auth_header_sent() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                // "user:secret" base64-encoded.
                when.method(POST)
                    .path("/query")
                    .header("authorization", "Basic dXNlcjpzZWNyZXQ=");
                then.status(200)
                    .json_body(serde_json::json!({"head": {}, "boolean": true}));
            })
            .await;

        let mut config = SparqlConfig::new(server.url("/query"), server.url("/update"))
            .with_auth("user", "secret");
        config.retry_backoff = Duration::from_millis(1);
        let client = SparqlClient::new(config).unwrap();
        assert!(client.ask("ASK { }").await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_is_available() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/query");
                then.status(200)
                    .json_body(serde_json::json!({"head": {}, "boolean": true}));
            })
            .await;

        let client = client_for(&server);
        assert!(client.is_available().await);
    }

    #[tokio::test]
    async fn test_error_messages_never_contain_query_text() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/query");
                then.status(500);
            })
            .await;

        let client = client_for(&server);
        let secret_query = "SELECT ?password WHERE { ?s <sekrit> ?password }";
        let err = client.select(secret_query).await.unwrap_err();
        assert!(!err.to_string().contains("sekrit"));
        assert!(!err.to_string().contains("password"));
    }
}
