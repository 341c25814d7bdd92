//! Cache invalidation over the SPARQL backend (mocked endpoint pair).

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use semem_core::storage::StorageBackend;
use semem_storage_sparql::{CacheConfig, CachedSparqlStore, SparqlConfig, SparqlStore};
use test_utils::{init_test_logging, test_interaction};

const RESULTS: &str = r#"{
    "head": {"vars": ["s"]},
    "results": {"bindings": [
        {"s": {"type": "uri", "value": "http://example.org/a"}}
    ]}
}"#;

fn cached_store(server: &MockServer) -> CachedSparqlStore {
    init_test_logging();
    let mut config = SparqlConfig::new(server.url("/query"), server.url("/update"))
        .with_graph("http://example.org/memory");
    config.retry_backoff = Duration::from_millis(1);
    let inner = Arc::new(SparqlStore::new(config).expect("store builds"));
    CachedSparqlStore::new(inner, CacheConfig::default())
}

#[tokio::test]
async fn write_between_identical_queries_forces_refetch() {
    let server = MockServer::start_async().await;
    let query_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/query");
            then.status(200)
                .header("content-type", "application/sparql-results+json")
                .body(RESULTS);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/update");
            then.status(204);
        })
        .await;

    let store = cached_store(&server);
    let query = "SELECT ?s WHERE { ?s ?p ?o }";

    // Two identical queries in quick succession: one endpoint round-trip.
    let first = store.query(query).await.expect("first query");
    let second = store.query(query).await.expect("second query");
    assert_eq!(first, second);
    assert_eq!(query_mock.hits_async().await, 1);

    // A write through the same adapter invalidates everything.
    store
        .append(&test_interaction("new", vec![1.0, 0.0, 0.0, 0.0], &["x"]))
        .await
        .expect("append");

    let third = store.query(query).await.expect("third query");
    assert_eq!(third, first);
    assert_eq!(query_mock.hits_async().await, 2);

    let metrics = store.metrics();
    assert_eq!(metrics.hits, 1);
    assert_eq!(metrics.misses, 2);
    assert_eq!(metrics.invalidations, 1);
}

#[tokio::test]
async fn load_append_reload_round_trip() {
    let server = MockServer::start_async().await;

    // Empty graph at first load.
    let empty_load = server
        .mock_async(|when, then| {
            when.method(POST).path("/query");
            then.status(200).body(
                r#"{"head": {"vars": []}, "results": {"bindings": []}}"#,
            );
        })
        .await;
    let update_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/update")
                .body_includes("INSERT DATA");
            then.status(204);
        })
        .await;

    let store = cached_store(&server);
    let loaded = store.load_all().await.expect("load");
    assert!(loaded.interactions.is_empty());
    assert!(empty_load.hits_async().await >= 1);

    store
        .append(&test_interaction("abc", vec![1.0, 0.0, 0.0, 0.0], &["rust"]))
        .await
        .expect("append");
    assert_eq!(update_mock.hits_async().await, 1);
}

#[tokio::test]
async fn close_stops_serving() {
    let server = MockServer::start_async().await;
    let store = cached_store(&server);
    store.close().await.expect("close");
    assert!(
        store
            .append(&test_interaction("x", vec![1.0, 0.0, 0.0, 0.0], &[]))
            .await
            .is_err()
    );
}
