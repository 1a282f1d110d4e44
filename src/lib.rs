pub mod actors;
#[cfg(feature = "api")]
pub mod api;
pub mod collector;
pub mod config;
pub mod error;
pub mod memory;
pub mod parse;
pub mod query;
pub mod store;
pub mod transport;
pub mod util;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Unique identifier of a cluster node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Liveness of a node as reported by the node registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeState {
    Alive,
    Dead,
}

/// A node registry entry.
///
/// Only the fields the collector needs are typed; everything else the
/// registry hands us is kept in `extra` and passed through to queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub node_id: NodeId,
    pub node_manager_address: String,
    pub node_manager_port: i64,
    pub state: NodeState,
    #[serde(default)]
    pub node_manager_hostname: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeRecord {
    pub fn is_alive(&self) -> bool {
        self.state == NodeState::Alive
    }
}

/// Hex-encoded actor identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an actor currently lives
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorAddress {
    #[serde(default)]
    pub raylet_id: Option<NodeId>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub worker_id: Option<String>,
}

/// Actor metadata, always stored and replaced as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRecord {
    pub actor_id: ActorId,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub address: Option<ActorAddress>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActorRecord {
    /// Node the actor is placed on, if known
    pub fn node_id(&self) -> Option<&NodeId> {
        self.address.as_ref().and_then(|a| a.raylet_id.as_ref())
    }
}

/// A batch of log lines emitted by one process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogBatch {
    #[serde(rename = "ip")]
    pub host: String,
    #[serde(deserialize_with = "pid_as_string")]
    pub pid: String,
    pub lines: Vec<String>,
}

/// Error event as published on the error topics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub error_message: String,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub job_id: Option<String>,
}

/// Normalized error entry stored per (host, pid)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub error_type: String,
}

/// Accepts both `"pid": 123` and `"pid": "123"`
fn pid_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(pid) => Ok(pid),
        Value::Number(pid) => Ok(pid.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected pid as number or string, got {other}"
        ))),
    }
}
