//! Shared fixtures for the integration tests

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cluster_telemetry::{
    ActorRecord, NodeId, NodeRecord, NodeState,
    collector::{Collaborators, Collector},
    config::{CollectorConfig, NodeConfig},
    error::{CollectorError, CollectorResult},
    transport::{ActorDirectory, ActorTableReply, HttpStubFactory, LocalBus, ReplyStatus},
};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn node_record(id: &str, address: &str, port: i64, state: NodeState) -> NodeRecord {
    NodeRecord {
        node_id: NodeId::new(id),
        node_manager_address: address.to_string(),
        node_manager_port: port,
        state,
        node_manager_hostname: format!("host-{id}"),
        extra: Default::default(),
    }
}

/// Host and port of a mock server
pub fn host_port(server: &MockServer) -> (String, i64) {
    let url = url::Url::parse(&server.uri()).unwrap();
    (
        url.host_str().unwrap().to_string(),
        i64::from(url.port().unwrap()),
    )
}

pub fn node_config(id: &str, server: &MockServer) -> NodeConfig {
    let (address, port) = host_port(server);
    NodeConfig {
        id: id.to_string(),
        address,
        port,
        hostname: Some(format!("host-{id}")),
    }
}

/// Mock agent answering every stats request with `stats`
pub async fn mock_agent(stats: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stats))
        .mount(&server)
        .await;
    server
}

/// Config that never polls on its own; tests drive cycles with `poll_now`
pub fn manual_config() -> CollectorConfig {
    CollectorConfig {
        poll_interval_ms: 3_600_000,
        poll_deadline_ms: 300,
        actor_fetch_deadline_ms: 300,
        actor_retry_interval_ms: 20,
        ..Default::default()
    }
}

pub fn actor(id: &str, state: &str, node: &str) -> ActorRecord {
    serde_json::from_value(json!({
        "actorId": id,
        "state": state,
        "address": {"rayletId": node, "ipAddress": "10.0.0.1", "port": 10001}
    }))
    .unwrap()
}

/// Directory failing `failures` times before returning `records`
pub struct ScriptedDirectory {
    pub failures: u32,
    pub calls: AtomicU32,
    pub records: Vec<ActorRecord>,
}

impl ScriptedDirectory {
    pub fn new(failures: u32, records: Vec<ActorRecord>) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicU32::new(0),
            records,
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActorDirectory for ScriptedDirectory {
    async fn get_all_actors(&self, _: Duration) -> CollectorResult<ActorTableReply> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(CollectorError::Transport("connection refused".into()));
        }
        Ok(ActorTableReply {
            status: ReplyStatus::default(),
            actor_table_data: self.records.clone(),
        })
    }
}

pub async fn spawn_collector(
    config: &CollectorConfig,
    nodes: &[NodeConfig],
    directory: Arc<dyn ActorDirectory>,
    bus: Arc<LocalBus>,
) -> Collector {
    Collector::spawn(
        config,
        nodes,
        Collaborators {
            stubs: Arc::new(HttpStubFactory::new().unwrap()),
            actor_directory: directory,
            bus,
        },
    )
    .await
    .unwrap()
}

/// Poll `condition` until it holds, failing after two seconds
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
