//! Integration tests for the query API
//!
//! These tests verify that:
//! - Every endpoint answers with the `{result, msg, data}` envelope
//! - Authentication middleware rejects missing or wrong tokens
//! - Registry and bus admin endpoints feed the collector

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use cluster_telemetry::{
    NodeState,
    api::{ApiConfig, ApiState, spawn_api_server},
    collector::Collector,
    transport::LocalBus,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use crate::helpers::*;

const TOKEN: &str = "test-token";

async fn spawn_test_api(collector: &Collector, bus: Arc<LocalBus>) -> SocketAddr {
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        auth_token: Some(TOKEN.to_string()),
        enable_cors: true,
    };

    spawn_api_server(config, ApiState::new(collector.query(), bus))
        .await
        .unwrap()
}

async fn get(addr: SocketAddr, path: &str) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .get(format!("http://{addr}{path}"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_health_requires_token() {
    let bus = Arc::new(LocalBus::default());
    let collector =
        spawn_collector(&manual_config(), &[], ScriptedDirectory::new(0, vec![]), bus.clone()).await;
    let addr = spawn_test_api(&collector, bus).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/api/v1/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .get(format!("http://{addr}/api/v1/health"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"], false);

    let (status, body) = get(addr, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], true);
    assert!(body["data"]["timestamp"].is_string());

    collector.shutdown().await;
}

#[tokio::test]
async fn test_node_views() {
    let agent = mock_agent(json!({
        "numWorkers": 1,
        "coreWorkersStats": [{
            "pid": 9,
            "ipAddress": "127.0.0.1",
            "objectRefs": [{"objectId": "aa", "callSite": "main.py:3", "objectSize": 64, "localRefCount": 1}]
        }]
    }))
    .await;
    let bus = Arc::new(LocalBus::default());
    let collector = spawn_collector(
        &manual_config(),
        &[node_config("n1", &agent)],
        ScriptedDirectory::new(0, vec![actor("a1", "ALIVE", "n1")]),
        bus.clone(),
    )
    .await;
    collector.peer_sync.flush().await.unwrap();
    collector.actor_table.wait_live().await.unwrap();
    collector.poller.poll_now().await.unwrap();
    let addr = spawn_test_api(&collector, bus).await;

    let (_, body) = get(addr, "/api/v1/nodes?view=hostnamelist").await;
    assert_eq!(body["data"]["hostNameList"], json!(["host-n1"]));

    let (_, body) = get(addr, "/api/v1/nodes?view=summary").await;
    let summary = &body["data"]["summary"][0];
    assert_eq!(summary["raylet"]["numWorkers"], 1);
    assert!(summary["raylet"].get("coreWorkersStats").is_none());
    assert!(summary.get("actors").is_none());

    let (_, body) = get(addr, "/api/v1/nodes?view=details").await;
    assert!(body["data"]["clients"][0]["raylet"]["coreWorkersStats"].is_array());

    let (status, body) = get(addr, "/api/v1/nodes/n1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["detail"]["actors"]["a1"].is_object());

    let (status, body) = get(addr, "/api/v1/nodes/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["result"], false);

    let (status, _) = get(addr, "/api/v1/nodes?view=everything").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = get(addr, "/api/v1/memory/memory_table?group_by=node&sort_by=pid").await;
    let group = &body["data"]["memoryTable"]["group"]["127.0.0.1"];
    assert_eq!(group["entries"][0]["referenceType"], "LOCAL_REFERENCE");
    assert_eq!(group["summary"]["total_object_size"], 64);

    collector.shutdown().await;
}

#[tokio::test]
async fn test_memory_fetch_toggle() {
    let bus = Arc::new(LocalBus::default());
    let collector =
        spawn_collector(&manual_config(), &[], ScriptedDirectory::new(0, vec![]), bus.clone()).await;
    let addr = spawn_test_api(&collector, bus).await;

    let (status, _) = get(addr, "/api/v1/memory/set_fetch?shouldFetch=true").await;
    assert_eq!(status, StatusCode::OK);
    assert!(collector.poller.memory_info_collection());

    let (status, _) = get(addr, "/api/v1/memory/set_fetch?shouldFetch=maybe").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(collector.poller.memory_info_collection());

    get(addr, "/api/v1/memory/set_fetch?shouldFetch=false").await;
    assert!(!collector.poller.memory_info_collection());

    collector.shutdown().await;
}

#[tokio::test]
async fn test_registry_admin_endpoints() {
    let bus = Arc::new(LocalBus::default());
    let collector =
        spawn_collector(&manual_config(), &[], ScriptedDirectory::new(0, vec![]), bus.clone()).await;
    let addr = spawn_test_api(&collector, bus).await;
    let client = reqwest::Client::new();

    let record = node_record("n9", "10.0.0.9", 51243, NodeState::Alive);
    let response = client
        .put(format!("http://{addr}/api/v1/nodes/n9"))
        .bearer_auth(TOKEN)
        .json(&record)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    collector.peer_sync.flush().await.unwrap();
    assert_eq!(collector.peers().len(), 1);

    let response = client
        .put(format!("http://{addr}/api/v1/nodes/other"))
        .bearer_auth(TOKEN)
        .json(&record)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client
        .delete(format!("http://{addr}/api/v1/nodes/n9"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    collector.peer_sync.flush().await.unwrap();
    assert!(collector.peers().is_empty());

    collector.shutdown().await;
}

#[tokio::test]
async fn test_published_logs_and_errors_are_queryable() {
    let bus = Arc::new(LocalBus::default());
    let collector =
        spawn_collector(&manual_config(), &[], ScriptedDirectory::new(0, vec![]), bus.clone()).await;
    let addr = spawn_test_api(&collector, bus).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/v1/bus/RAY_LOG_CHANNEL"))
        .bearer_auth(TOKEN)
        .body(json!({"ip": "10.0.0.5", "pid": 3, "lines": ["hello"]}).to_string())
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    // actor table, log relay and error relay
    assert_eq!(body["data"]["subscribers"], 3);

    client
        .post(format!("http://{addr}/api/v1/bus/ERROR_INFO:job"))
        .bearer_auth(TOKEN)
        .body(
            json!({"errorMessage": "boom (pid=3, ip=10.0.0.5)", "timestamp": 2.0, "type": "task"})
                .to_string(),
        )
        .send()
        .await
        .unwrap();

    let store = collector.store();
    wait_until(|| {
        let store = store.clone();
        async move { store.logs().total() == 1 && store.errors().total() == 1 }
    })
    .await;

    let (_, body) = get(addr, "/api/v1/node_logs?ip=10.0.0.5&pid=3").await;
    assert_eq!(body["data"]["logs"], json!(["hello"]));

    let (_, body) = get(addr, "/api/v1/node_errors?ip=10.0.0.5").await;
    assert_eq!(body["data"]["errors"]["3"][0]["message"], "boom (pid=3, ip=10.0.0.5)");

    let (status, _) = get(addr, "/api/v1/node_logs").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    collector.shutdown().await;
}
