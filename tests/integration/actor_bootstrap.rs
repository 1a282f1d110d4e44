//! Actor table bootstrap and live updates
//!
//! These tests verify that:
//! - The bulk fetch is retried until it succeeds, however often it fails
//! - Events published during bootstrap are not lost
//! - Stream events fully replace the bootstrapped record

use std::sync::Arc;
use std::time::Duration;

use cluster_telemetry::{
    ActorId,
    actors::messages::SyncPhase,
    transport::{HttpActorDirectory, LocalBus},
};
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_bootstrap_survives_repeated_failures() {
    let directory = ScriptedDirectory::new(
        7,
        vec![actor("a1", "ALIVE", "n1"), actor("a2", "ALIVE", "n2")],
    );
    let collector = spawn_collector(
        &manual_config(),
        &[],
        directory.clone(),
        Arc::new(LocalBus::default()),
    )
    .await;

    collector.actor_table.wait_live().await.unwrap();

    assert_eq!(directory.calls(), 8);
    let actors = collector.store().actors();
    assert_eq!(
        actors.keys().cloned().collect::<Vec<_>>(),
        vec![ActorId("a1".into()), ActorId("a2".into())]
    );

    collector.shutdown().await;
}

#[tokio::test]
async fn test_http_directory_bad_status_then_ok() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/actors"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/actors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"code": 5, "message": "GCS not ready"},
            "actorTableData": []
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/actors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"code": 0},
            "actorTableData": [{"actorId": "a1", "state": "ALIVE", "address": {"rayletId": "n1"}}]
        })))
        .mount(&server)
        .await;

    let directory = Arc::new(HttpActorDirectory::new(&server.uri()).unwrap());
    let collector = spawn_collector(
        &manual_config(),
        &[],
        directory,
        Arc::new(LocalBus::default()),
    )
    .await;

    tokio::time::timeout(Duration::from_secs(2), collector.actor_table.wait_live())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert_eq!(collector.store().actor_count(), 1);
    assert_matches!(collector.actor_table.phase(), SyncPhase::Live);

    collector.shutdown().await;
}

#[tokio::test]
async fn test_event_replaces_snapshot_record() {
    let bus = Arc::new(LocalBus::default());
    let mut v1 = actor("a1", "PENDING_CREATION", "n1");
    v1.extra.insert("name".into(), json!("first"));

    let collector = spawn_collector(
        &manual_config(),
        &[],
        ScriptedDirectory::new(0, vec![v1]),
        bus.clone(),
    )
    .await;
    collector.actor_table.wait_live().await.unwrap();

    let v2 = actor("a1", "ALIVE", "n2");
    bus.publish("ACTOR:a1", serde_json::to_vec(&v2).unwrap());

    let store = collector.store();
    wait_until(|| {
        let store = store.clone();
        async move {
            store
                .actor(&ActorId("a1".into()))
                .is_some_and(|a| a.state.as_deref() == Some("ALIVE"))
        }
    })
    .await;

    assert_eq!(store.actor(&ActorId("a1".into())).unwrap(), v2);

    collector.shutdown().await;
}

#[tokio::test]
async fn test_events_during_bootstrap_are_applied() {
    let bus = Arc::new(LocalBus::default());
    let collector = spawn_collector(
        &manual_config(),
        &[],
        ScriptedDirectory::new(3, vec![actor("a1", "ALIVE", "n1")]),
        bus.clone(),
    )
    .await;

    bus.publish(
        "ACTOR:a2",
        serde_json::to_vec(&actor("a2", "ALIVE", "n1")).unwrap(),
    );
    collector.actor_table.wait_live().await.unwrap();

    let store = collector.store();
    wait_until(|| {
        let store = store.clone();
        async move { store.actor_count() == 2 }
    })
    .await;

    collector.shutdown().await;
}
