//! Crash recovery and dimension adaptation over the JSON backend.

use std::sync::Arc;

use semem_core::store::{MemoryStore, RecallOptions, RememberRequest};
use semem_core::types::MemoryConfig;
use semem_core::Warning;
use semem_storage_json::{JsonStore, JsonStoreConfig};
use test_utils::{init_test_logging, unit_vector};

async fn store_at(path: &std::path::Path, dimension: usize) -> MemoryStore {
    init_test_logging();
    let backend = JsonStore::open(path, dimension, JsonStoreConfig::default())
        .await
        .expect("backend opens");
    let store = MemoryStore::builder(MemoryConfig::new(dimension))
        .with_storage(Arc::new(backend))
        .build()
        .expect("store builds");
    store.initialize().await.expect("store initializes");
    store
}

#[tokio::test]
async fn restart_after_kill_recovers_everything() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("memory.json");

    {
        let store = store_at(&path, 4).await;
        store
            .remember(RememberRequest::new(
                "hi",
                "hello",
                unit_vector(4, 0),
                vec!["greeting".into()],
            ))
            .await
            .expect("first remember");
        store
            .remember(RememberRequest::new(
                "bye",
                "goodbye",
                unit_vector(4, 1),
                vec!["farewell".into()],
            ))
            .await
            .expect("second remember");
        // Simulated crash: the store is dropped without dispose or flush.
    }

    let revived = store_at(&path, 4).await;
    let stats = revived.stats().await;
    assert_eq!(stats.short_count, 2);

    let outcome = revived
        .recall(
            &unit_vector(4, 0),
            RecallOptions::default().with_k(1).with_threshold(0.5),
        )
        .await
        .expect("recall after restart");
    assert_eq!(outcome.interactions[0].interaction.prompt, "hi");

    // Original creation order survives in the snapshot.
    let found = revived.find_by_concept("farewell").await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].prompt, "bye");
}

#[tokio::test]
async fn reload_adapts_shorter_persisted_embedding() {
    init_test_logging();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("memory.json");

    // Persist a 3-dimensional interaction by hand.
    let snapshot = serde_json::json!({
        "version": 1,
        "dimension": 3,
        "interactions": [{
            "id": "legacy",
            "prompt": "old prompt",
            "response": "old response",
            "embedding": [0.6, 0.8, 0.0],
            "concepts": ["legacy"],
            "timestamp": 1000,
            "accessCount": 0,
            "lastAccessed": 1000,
            "decayFactor": 1.0,
            "tier": "short"
        }]
    });
    tokio::fs::write(&path, serde_json::to_vec_pretty(&snapshot).expect("encode"))
        .await
        .expect("seed file");

    // Open under dimension 4 with the default adapt policy.
    let backend = JsonStore::open(&path, 4, JsonStoreConfig::default())
        .await
        .expect("backend opens");
    let store = MemoryStore::builder(MemoryConfig::new(4))
        .with_storage(Arc::new(backend))
        .build()
        .expect("store builds");
    let outcome = store.initialize().await.expect("initializes");

    assert_eq!(outcome.loaded, 1);
    assert!(
        outcome
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::DimensionAdapted { from: 3, to: 4, .. }))
    );

    // The padded embedding answers the original 3-dimensional direction.
    let recalled = store
        .recall(
            &[0.6, 0.8, 0.0, 0.0],
            RecallOptions::default().with_k(1).with_threshold(0.5),
        )
        .await
        .expect("recall");
    assert_eq!(recalled.interactions.len(), 1);
    assert_eq!(recalled.interactions[0].interaction.id, "legacy");
    assert_eq!(recalled.interactions[0].interaction.embedding.len(), 4);
}

#[tokio::test]
async fn corrupt_snapshot_quarantined_and_store_usable() {
    init_test_logging();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("memory.json");
    tokio::fs::write(&path, b"}{ totally broken")
        .await
        .expect("seed corrupt file");

    let backend = JsonStore::open(&path, 4, JsonStoreConfig::default())
        .await
        .expect("open quarantines instead of failing");
    let store = MemoryStore::builder(MemoryConfig::new(4))
        .with_storage(Arc::new(backend))
        .build()
        .expect("store builds");

    let outcome = store.initialize().await.expect("initializes empty");
    assert_eq!(outcome.loaded, 0);
    assert!(
        outcome
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::CorruptSnapshotRecovered { .. }))
    );

    // The store works normally afterwards.
    store
        .remember(RememberRequest::new(
            "fresh",
            "start",
            unit_vector(4, 0),
            vec![],
        ))
        .await
        .expect("remember after recovery");
    assert_eq!(store.stats().await.short_count, 1);
}

#[tokio::test]
async fn reinforcement_survives_restart_via_flush() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("memory.json");

    {
        let store = store_at(&path, 4).await;
        store
            .remember(RememberRequest::new(
                "hi",
                "hello",
                unit_vector(4, 0),
                vec!["greeting".into()],
            ))
            .await
            .expect("remember");
        store
            .recall(
                &unit_vector(4, 0),
                RecallOptions::default().with_k(1).with_threshold(0.5),
            )
            .await
            .expect("recall");
        store.dispose().await.expect("dispose flushes");
    }

    let revived = store_at(&path, 4).await;
    let found = revived.find_by_concept("greeting").await;
    assert_eq!(found[0].access_count, 1);
}
