//! End-to-end scenarios for the replicated configuration engine, driven
//! against a single-node cluster (quorum of one) with in-memory
//! collaborators. Each test starts its own node and waits for it to elect
//! itself leader before issuing writes.

use std::sync::Arc;
use std::time::Duration;

use config_engine::{ConfigEngine, EngineConfig};
use config_store_memory::{MemoryProjectRepository, MemoryRevisionStore, MemorySchemaRepository};
use config_types::ConfigError;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};

type Engine = ConfigEngine<MemoryProjectRepository, MemorySchemaRepository, MemoryRevisionStore>;

const PROJ1_KEY: &str = "cfg_11111111111111111111111111111111";
const PROJ2_KEY: &str = "cfg_22222222222222222222222222222222";

fn bool_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": { "enabled": { "type": "boolean" } },
        "required": ["enabled"]
    })
}

async fn harness() -> Engine {
    let config = EngineConfig::new(1, vec![]).with_apply_timeout(Duration::from_secs(2));

    let projects = Arc::new(MemoryProjectRepository::new());
    let schemas = Arc::new(MemorySchemaRepository::new());
    let revisions = Arc::new(MemoryRevisionStore::new());

    projects.insert(PROJ1_KEY, "proj1".to_string()).await;
    projects.insert(PROJ2_KEY, "proj2".to_string()).await;
    schemas.insert("sch1".to_string(), bool_schema()).await;

    // No real peer transport for a single-node cluster: the outgoing channel
    // is drained into nothing, and nothing ever feeds the incoming one.
    let (message_sender, _outgoing) = mpsc::unbounded_channel();
    let (_incoming, message_receiver) = mpsc::unbounded_channel();
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let (engine, node) = ConfigEngine::new(
        config,
        projects,
        schemas,
        revisions,
        message_sender,
        message_receiver,
        shutdown_rx,
    )
    .expect("valid engine configuration");

    tokio::spawn(node.run());
    // Single-node election timeout tops out at 300ms; give it room to settle.
    tokio::time::sleep(Duration::from_millis(500)).await;
    engine
}

#[tokio::test]
async fn s1_happy_path_create_then_update() {
    let engine = harness().await;

    let (version, content) = engine
        .create(
            "proj1".to_string(),
            "feature-x".to_string(),
            "sch1".to_string(),
            json!({"enabled": true}),
            "alice".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(version.get(), 1);
    assert_eq!(content, json!({"enabled": true}));

    let (version, content) = engine
        .update(
            "proj1".to_string(),
            "feature-x".to_string(),
            1,
            json!({"enabled": false}),
            "alice".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(version.get(), 2);
    assert_eq!(content, json!({"enabled": false}));

    let history = engine
        .list_revisions(&"proj1".to_string(), &"feature-x".to_string(), 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn s2_concurrent_updates_with_stale_expected_version_both_fail() {
    let engine = harness().await;
    engine
        .create(
            "proj1".to_string(),
            "feature-x".to_string(),
            "sch1".to_string(),
            json!({"enabled": true}),
            "alice".to_string(),
        )
        .await
        .unwrap();
    engine
        .update(
            "proj1".to_string(),
            "feature-x".to_string(),
            1,
            json!({"enabled": false}),
            "alice".to_string(),
        )
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        engine.update(
            "proj1".to_string(),
            "feature-x".to_string(),
            1,
            json!({"enabled": true}),
            "bob".to_string(),
        ),
        engine.update(
            "proj1".to_string(),
            "feature-x".to_string(),
            1,
            json!({"enabled": true}),
            "carol".to_string(),
        ),
    );

    for result in [a, b] {
        assert_eq!(
            result.unwrap_err(),
            ConfigError::VersionConflict { expected: 1, current: 2 }
        );
    }

    let (version, _) = engine
        .read_local(&"proj1".to_string(), &"feature-x".to_string())
        .await
        .unwrap();
    assert_eq!(version.get(), 2);
}

#[tokio::test]
async fn s3_concurrent_updates_with_current_version_exactly_one_wins() {
    let engine = harness().await;
    engine
        .create(
            "proj1".to_string(),
            "feature-x".to_string(),
            "sch1".to_string(),
            json!({"enabled": true}),
            "alice".to_string(),
        )
        .await
        .unwrap();
    engine
        .update(
            "proj1".to_string(),
            "feature-x".to_string(),
            1,
            json!({"enabled": false}),
            "alice".to_string(),
        )
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        engine.update(
            "proj1".to_string(),
            "feature-x".to_string(),
            2,
            json!({"enabled": true}),
            "bob".to_string(),
        ),
        engine.update(
            "proj1".to_string(),
            "feature-x".to_string(),
            2,
            json!({"enabled": false}),
            "carol".to_string(),
        ),
    );

    let successes = [&a, &b].into_iter().filter(|r| r.is_ok()).count();
    let conflicts = [&a, &b]
        .into_iter()
        .filter(|r| {
            matches!(
                r,
                Err(ConfigError::VersionConflict { expected: 2, current: 3 })
            )
        })
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);

    let (version, _) = engine
        .read_local(&"proj1".to_string(), &"feature-x".to_string())
        .await
        .unwrap();
    assert_eq!(version.get(), 3);
}

#[tokio::test]
async fn s4_schema_violation_is_rejected_before_proposing() {
    let engine = harness().await;
    engine
        .create(
            "proj1".to_string(),
            "feature-x".to_string(),
            "sch1".to_string(),
            json!({"enabled": true}),
            "alice".to_string(),
        )
        .await
        .unwrap();

    let result = engine
        .update(
            "proj1".to_string(),
            "feature-x".to_string(),
            1,
            json!({"enabled": "not-a-bool"}),
            "alice".to_string(),
        )
        .await;
    assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));

    let (version, content) = engine
        .read_local(&"proj1".to_string(), &"feature-x".to_string())
        .await
        .unwrap();
    assert_eq!(version.get(), 1);
    assert_eq!(content, json!({"enabled": true}));
}

#[tokio::test]
async fn s5_rollback_creates_a_new_version_with_historical_content() {
    let engine = harness().await;
    let content_v1 = json!({"enabled": true});
    let content_v2 = json!({"enabled": false});
    let content_v3 = json!({"enabled": true});

    engine
        .create(
            "proj1".to_string(),
            "feature-x".to_string(),
            "sch1".to_string(),
            content_v1.clone(),
            "alice".to_string(),
        )
        .await
        .unwrap();
    engine
        .update(
            "proj1".to_string(),
            "feature-x".to_string(),
            1,
            content_v2.clone(),
            "alice".to_string(),
        )
        .await
        .unwrap();
    engine
        .update(
            "proj1".to_string(),
            "feature-x".to_string(),
            2,
            content_v3.clone(),
            "alice".to_string(),
        )
        .await
        .unwrap();

    let (version, content) = engine
        .rollback(
            "proj1".to_string(),
            "feature-x".to_string(),
            1,
            "alice".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(version.get(), 4);
    assert_eq!(content, content_v1);

    let latest = engine
        .list_revisions(&"proj1".to_string(), &"feature-x".to_string(), 1)
        .await
        .unwrap();
    assert_eq!(latest[0].version.get(), 4);
    assert_eq!(latest[0].content, content_v1);
}

#[tokio::test]
async fn s6_client_read_is_project_scoped() {
    let engine = harness().await;
    engine
        .create(
            "proj1".to_string(),
            "feature-x".to_string(),
            "sch1".to_string(),
            json!({"enabled": true}),
            "alice".to_string(),
        )
        .await
        .unwrap();
    engine
        .update(
            "proj1".to_string(),
            "feature-x".to_string(),
            1,
            json!({"enabled": false}),
            "alice".to_string(),
        )
        .await
        .unwrap();

    let (version, content) = engine
        .client_read(PROJ1_KEY, &"feature-x".to_string())
        .await
        .unwrap();
    assert_eq!(version.get(), 2);
    assert_eq!(content, json!({"enabled": false}));

    let result = engine.client_read(PROJ2_KEY, &"feature-x".to_string()).await;
    assert!(matches!(result, Err(ConfigError::NotFound)));
}

#[tokio::test]
async fn delete_then_create_starts_a_fresh_version_sequence() {
    let engine = harness().await;
    engine
        .create(
            "proj1".to_string(),
            "feature-x".to_string(),
            "sch1".to_string(),
            json!({"enabled": true}),
            "alice".to_string(),
        )
        .await
        .unwrap();

    engine
        .delete("proj1".to_string(), "feature-x".to_string(), "alice".to_string())
        .await
        .unwrap();

    let missing = engine
        .read_local(&"proj1".to_string(), &"feature-x".to_string())
        .await;
    assert!(matches!(missing, Err(ConfigError::NotFound)));

    let (version, _) = engine
        .create(
            "proj1".to_string(),
            "feature-x".to_string(),
            "sch1".to_string(),
            json!({"enabled": false}),
            "alice".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(version.get(), 1);

    let revisions_after_recreate = engine
        .list_revisions(&"proj1".to_string(), &"feature-x".to_string(), 10)
        .await
        .unwrap();
    assert_eq!(revisions_after_recreate.len(), 1);
}
