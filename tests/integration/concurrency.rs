//! Interleaved writes and reads against one shared store.

use std::sync::Arc;

use futures::future::join_all;
use semem_core::store::{MemoryStore, RecallOptions, RememberRequest};
use semem_core::types::MemoryConfig;
use test_utils::{init_test_logging, unit_vector};

async fn shared_store(dimension: usize) -> Arc<MemoryStore> {
    init_test_logging();
    let store = Arc::new(
        MemoryStore::builder(MemoryConfig::new(dimension))
            .build()
            .expect("store builds"),
    );
    store.initialize().await.expect("initializes");
    store
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_remembers_all_land() {
    let store = shared_store(8).await;

    let mut handles = Vec::new();
    for axis in 0..8 {
        for round in 0..4 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .remember(RememberRequest::new(
                        format!("prompt {axis}-{round}"),
                        "response",
                        unit_vector(8, axis),
                        vec![format!("axis{axis}")],
                    ))
                    .await
            }));
        }
    }

    let mut ids = std::collections::HashSet::new();
    for joined in join_all(handles).await {
        let id = joined.expect("task joins").expect("remember succeeds");
        assert!(ids.insert(id), "ids must be unique across writers");
    }

    let stats = store.stats().await;
    assert_eq!(stats.short_count, 32);
    assert_eq!(store.index().size(), 32);

    // Durable order matches: re-initialising loses nothing.
    let outcome = store.initialize().await.expect("re-init");
    assert_eq!(outcome.loaded, 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn writes_visible_to_subsequent_recalls() {
    let store = shared_store(4).await;

    // A remember that returned is immediately recallable, even while
    // other writers are active.
    let background = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for round in 0..16 {
                store
                    .remember(RememberRequest::new(
                        format!("noise {round}"),
                        "noise",
                        unit_vector(4, 1),
                        vec![],
                    ))
                    .await
                    .expect("background remember");
            }
        })
    };

    store
        .remember(RememberRequest::new(
            "signal",
            "found it",
            unit_vector(4, 0),
            vec!["signal".into()],
        ))
        .await
        .expect("remember signal");

    let outcome = store
        .recall(
            &unit_vector(4, 0),
            RecallOptions::default().with_k(1).with_threshold(0.9),
        )
        .await
        .expect("recall");
    assert_eq!(outcome.interactions[0].interaction.prompt, "signal");

    background.await.expect("background joins");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_recalls_reinforce_consistently() {
    let store = shared_store(4).await;
    store
        .remember(RememberRequest::new(
            "hot",
            "entry",
            unit_vector(4, 0),
            vec![],
        ))
        .await
        .expect("remember");

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .recall(
                    &unit_vector(4, 0),
                    RecallOptions::default().with_k(1).with_threshold(0.5),
                )
                .await
        }));
    }
    for joined in join_all(handles).await {
        joined.expect("task joins").expect("recall succeeds");
    }

    // Ten hits, counted exactly once each under the writer lock.
    let outcome = store
        .recall(
            &unit_vector(4, 0),
            RecallOptions::default().with_k(1).with_threshold(0.5),
        )
        .await
        .expect("final recall");
    assert_eq!(outcome.interactions[0].interaction.access_count, 11);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn promotion_happens_exactly_once_under_contention() {
    init_test_logging();
    let mut config = MemoryConfig::new(4);
    config.memory.promotion_threshold = 2;
    let store = Arc::new(MemoryStore::builder(config).build().expect("store builds"));
    store.initialize().await.expect("initializes");
    store
        .remember(RememberRequest::new(
            "contended",
            "entry",
            unit_vector(4, 0),
            vec![],
        ))
        .await
        .expect("remember");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .recall(
                    &unit_vector(4, 0),
                    RecallOptions::default().with_k(1).with_threshold(0.5),
                )
                .await
        }));
    }
    for joined in join_all(handles).await {
        joined.expect("task joins").expect("recall succeeds");
    }

    let stats = store.stats().await;
    assert_eq!(stats.short_count, 0);
    assert_eq!(stats.long_count, 1);
}
