//! End-to-end memory flows over the in-process backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use semem_core::context::{ContextOptions, ContextWindowManager};
use semem_core::store::{MemoryStore, RecallOptions, RememberRequest};
use semem_core::types::MemoryConfig;
use semem_core::{SememEngine, Tier};
use test_utils::{HashEmbeddings, KeywordChat, init_test_logging, unit_vector};

async fn fresh_store(dimension: usize) -> MemoryStore {
    init_test_logging();
    let store = MemoryStore::builder(MemoryConfig::new(dimension))
        .build()
        .expect("store builds");
    store.initialize().await.expect("store initializes");
    store
}

#[tokio::test]
async fn basic_remember_recall() {
    let store = fresh_store(4).await;

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

    let outcome = store
        .recall(
            &unit_vector(4, 0),
            RecallOptions::default().with_k(1).with_threshold(0.5),
        )
        .await
        .expect("recall succeeds");

    assert_eq!(outcome.interactions.len(), 1);
    let hit = &outcome.interactions[0];
    assert_eq!(hit.interaction.prompt, "hi");
    assert!((hit.similarity - 1.0).abs() < 1e-5);
    assert_eq!(hit.interaction.access_count, 1);
    assert!(!outcome.partial);
}

#[tokio::test]
async fn repeated_recall_promotes_to_long_tier() {
    init_test_logging();
    let mut config = MemoryConfig::new(4);
    config.memory.promotion_threshold = 3;
    let store = MemoryStore::builder(config).build().expect("store builds");
    store.initialize().await.expect("initializes");

    store
        .remember(RememberRequest::new(
            "hi",
            "hello",
            unit_vector(4, 0),
            vec!["greeting".into()],
        ))
        .await
        .expect("remember");

    for round in 1..=3u32 {
        let outcome = store
            .recall(
                &unit_vector(4, 0),
                RecallOptions::default().with_k(1).with_threshold(0.5),
            )
            .await
            .expect("recall");
        let hit = &outcome.interactions[0];
        assert_eq!(hit.interaction.access_count, round);
        if round < 3 {
            assert_eq!(hit.interaction.tier, Tier::Short);
        } else {
            assert_eq!(hit.interaction.tier, Tier::Long);
            assert!(hit.interaction.decay_factor <= 1.0);
        }
    }

    let stats = store.stats().await;
    assert_eq!(stats.short_count, 0);
    assert_eq!(stats.long_count, 1);
}

#[tokio::test]
async fn concept_lookup_is_case_insensitive() {
    let store = fresh_store(4).await;
    store
        .remember(RememberRequest::new(
            "hi",
            "hello",
            unit_vector(4, 0),
            vec!["greeting".into()],
        ))
        .await
        .expect("remember");

    let found = store.find_by_concept("Greeting").await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].prompt, "hi");
}

#[tokio::test]
async fn snapshot_export_import_round_trip() {
    let store = fresh_store(4).await;
    for axis in 0..3 {
        store
            .remember(RememberRequest::new(
                format!("prompt {axis}"),
                format!("response {axis}"),
                unit_vector(4, axis),
                vec![format!("topic{axis}")],
            ))
            .await
            .expect("remember");
    }

    let exported = store.export_snapshot().await.expect("export");

    let restored = fresh_store(4).await;
    let outcome = restored.import_snapshot(&exported).await.expect("import");
    assert_eq!(outcome.imported, 3);

    let reexported = restored.export_snapshot().await.expect("re-export");
    let a: serde_json::Value = serde_json::from_slice(&exported).expect("json");
    let b: serde_json::Value = serde_json::from_slice(&reexported).expect("json");
    assert_eq!(a, b);
}

#[tokio::test]
async fn engine_flow_with_providers() {
    init_test_logging();
    let store = Arc::new(
        MemoryStore::builder(MemoryConfig::new(16))
            .build()
            .expect("store builds"),
    );
    store.initialize().await.expect("initializes");
    let engine = SememEngine::new(
        store,
        Arc::new(HashEmbeddings::new(16)),
        Arc::new(KeywordChat),
    )
    .expect("engine binds");

    engine
        .remember(
            "what is semantic memory",
            "memory organised by meaning",
            BTreeMap::new(),
        )
        .await
        .expect("remember through engine");

    let outcome = engine
        .recall(
            "what is semantic memory\nmemory organised by meaning",
            RecallOptions::default().with_threshold(0.5),
        )
        .await
        .expect("recall through engine");
    assert_eq!(outcome.interactions.len(), 1);

    let answer = engine
        .ask(
            "semantic memory?",
            RecallOptions::default().with_threshold(0.0),
            &ContextOptions::default(),
        )
        .await
        .expect("ask");
    assert!(answer.contains("reply to"));
}

#[tokio::test]
async fn recalled_context_respects_budget() {
    let store = fresh_store(4).await;
    for axis in 0..4 {
        store
            .remember(RememberRequest::new(
                format!("question number {axis} with some length"),
                "answer ".repeat(20),
                unit_vector(4, axis),
                vec![],
            ))
            .await
            .expect("remember");
    }

    let outcome = store
        .recall(
            &unit_vector(4, 0),
            RecallOptions::default().with_k(4).with_threshold(0.0),
        )
        .await
        .expect("recall");
    let interactions: Vec<_> = outcome
        .interactions
        .into_iter()
        .map(|s| s.interaction)
        .collect();

    let manager = ContextWindowManager::default();
    let bounded = manager.build_context(&interactions, &ContextOptions::with_budget(30));
    let unbounded = manager.build_context(&interactions, &ContextOptions::with_budget(100_000));
    assert!(bounded.len() < unbounded.len());
    // 30 tokens at 4 chars/token bounds the context to ~120 chars.
    assert!(bounded.chars().count() <= 30 * 4);
}
