//! Stats polling against mock agents
//!
//! These tests verify that:
//! - A hanging agent does not hold back other agents in the same cycle
//! - Stats are replaced wholesale on every successful poll
//! - Non-ALIVE nodes are not polled
//! - The memory flag reaches the agent on the next cycle

use std::sync::Arc;
use std::time::{Duration, Instant};

use cluster_telemetry::{NodeId, NodeState, transport::LocalBus};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_hanging_agent_does_not_delay_others() {
    let fast = mock_agent(json!({"node": "fast"})).await;
    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"node": "slow"}))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&slow)
        .await;

    let collector = spawn_collector(
        &manual_config(),
        &[node_config("fast", &fast), node_config("slow", &slow)],
        ScriptedDirectory::new(0, vec![]),
        Arc::new(LocalBus::default()),
    )
    .await;
    collector.peer_sync.flush().await.unwrap();

    let started = Instant::now();
    let report = collector.poller.poll_now().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.polled, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);

    let store = collector.store();
    assert_eq!(
        store.node_stats(&NodeId::new("fast")).unwrap().stats,
        json!({"node": "fast"})
    );
    assert!(store.node_stats(&NodeId::new("slow")).is_none());

    collector.shutdown().await;
}

#[tokio::test]
async fn test_second_reply_replaces_first() {
    let agent = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"a": 1, "b": 2})))
        .up_to_n_times(1)
        .mount(&agent)
        .await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"c": 3})))
        .mount(&agent)
        .await;

    let collector = spawn_collector(
        &manual_config(),
        &[node_config("n1", &agent)],
        ScriptedDirectory::new(0, vec![]),
        Arc::new(LocalBus::default()),
    )
    .await;
    collector.peer_sync.flush().await.unwrap();

    collector.poller.poll_now().await.unwrap();
    collector.poller.poll_now().await.unwrap();

    assert_eq!(
        collector.store().node_stats(&NodeId::new("n1")).unwrap().stats,
        json!({"c": 3})
    );

    collector.shutdown().await;
}

#[tokio::test]
async fn test_failed_poll_keeps_previous_stats() {
    let agent = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .up_to_n_times(1)
        .mount(&agent)
        .await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&agent)
        .await;

    let collector = spawn_collector(
        &manual_config(),
        &[node_config("n1", &agent)],
        ScriptedDirectory::new(0, vec![]),
        Arc::new(LocalBus::default()),
    )
    .await;
    collector.peer_sync.flush().await.unwrap();

    collector.poller.poll_now().await.unwrap();
    let report = collector.poller.poll_now().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(
        collector.store().node_stats(&NodeId::new("n1")).unwrap().stats,
        json!({"ok": true})
    );

    collector.shutdown().await;
}

#[tokio::test]
async fn test_dead_node_is_not_polled() {
    let agent = mock_agent(json!({})).await;
    let collector = spawn_collector(
        &manual_config(),
        &[],
        ScriptedDirectory::new(0, vec![]),
        Arc::new(LocalBus::default()),
    )
    .await;

    let (address, port) = host_port(&agent);
    collector
        .store()
        .nodes()
        .insert(node_record("n1", &address, port, NodeState::Dead))
        .await;
    collector.peer_sync.flush().await.unwrap();

    let report = collector.poller.poll_now().await.unwrap();

    assert_eq!(report.polled, 0);
    assert_eq!(report.skipped_not_alive, 1);
    assert!(agent.received_requests().await.unwrap().is_empty());

    collector.shutdown().await;
}

#[tokio::test]
async fn test_memory_flag_sent_to_agent() {
    let agent = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .and(query_param("include_memory_info", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"memory": true})))
        .mount(&agent)
        .await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .and(query_param("include_memory_info", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"memory": false})))
        .mount(&agent)
        .await;

    let collector = spawn_collector(
        &manual_config(),
        &[node_config("n1", &agent)],
        ScriptedDirectory::new(0, vec![]),
        Arc::new(LocalBus::default()),
    )
    .await;
    collector.peer_sync.flush().await.unwrap();
    let id = NodeId::new("n1");

    collector.poller.poll_now().await.unwrap();
    assert_eq!(collector.store().node_stats(&id).unwrap().stats["memory"], false);

    collector.query().set_memory_info_collection(true);
    collector.poller.poll_now().await.unwrap();
    assert_eq!(collector.store().node_stats(&id).unwrap().stats["memory"], true);

    collector.shutdown().await;
}

#[tokio::test]
async fn test_ticker_polls_without_commands() {
    let agent = mock_agent(json!({"tick": true})).await;
    let config = cluster_telemetry::config::CollectorConfig {
        poll_interval_ms: 50,
        poll_deadline_ms: 500,
        ..manual_config()
    };

    let collector = spawn_collector(
        &config,
        &[node_config("n1", &agent)],
        ScriptedDirectory::new(0, vec![]),
        Arc::new(LocalBus::default()),
    )
    .await;

    let store = collector.store();
    wait_until(|| {
        let store = store.clone();
        async move { store.node_stats(&NodeId::new("n1")).is_some() }
    })
    .await;

    collector.shutdown().await;
}
