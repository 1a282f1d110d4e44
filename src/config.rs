use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tracing::{trace, warn};

use crate::{NodeId, NodeRecord, NodeState};

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    /// Nodes the registry is seeded with at startup
    pub nodes: Option<Vec<NodeConfig>>,

    #[serde(default)]
    pub collector: CollectorConfig,

    pub actor_directory: Option<ActorDirectoryConfig>,

    pub api: Option<ApiSettings>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct NodeConfig {
    pub id: String,
    pub address: String,
    #[serde(default = "crate::util::get_default_agent_port")]
    pub port: i64,
    #[serde(default)]
    pub hostname: Option<String>,
}

impl NodeConfig {
    pub fn to_record(&self) -> NodeRecord {
        NodeRecord {
            node_id: NodeId::new(self.id.clone()),
            node_manager_address: self.address.clone(),
            node_manager_port: self.port,
            state: NodeState::Alive,
            node_manager_hostname: self.hostname.clone().unwrap_or_else(|| self.address.clone()),
            extra: Default::default(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_deadline_ms")]
    pub poll_deadline_ms: u64,
    #[serde(default)]
    pub include_memory_info: bool,
    #[serde(default = "default_deadline_ms")]
    pub actor_fetch_deadline_ms: u64,
    #[serde(default = "default_actor_retry_interval_ms")]
    pub actor_retry_interval_ms: u64,
    #[serde(default = "default_actor_topic_pattern")]
    pub actor_topic_pattern: String,
    #[serde(default = "default_log_topic")]
    pub log_topic: String,
    #[serde(default = "default_error_topic_pattern")]
    pub error_topic_pattern: String,
    /// 0 disables the cap
    #[serde(default = "default_max_log_lines")]
    pub max_log_lines_per_process: usize,
    /// 0 disables the cap
    #[serde(default = "default_max_errors")]
    pub max_errors_per_process: usize,
    #[serde(default = "default_purge_stats")]
    pub purge_stats_on_departure: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            poll_deadline_ms: default_deadline_ms(),
            include_memory_info: false,
            actor_fetch_deadline_ms: default_deadline_ms(),
            actor_retry_interval_ms: default_actor_retry_interval_ms(),
            actor_topic_pattern: default_actor_topic_pattern(),
            log_topic: default_log_topic(),
            error_topic_pattern: default_error_topic_pattern(),
            max_log_lines_per_process: default_max_log_lines(),
            max_errors_per_process: default_max_errors(),
            purge_stats_on_departure: default_purge_stats(),
        }
    }
}

impl CollectorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_deadline(&self) -> Duration {
        Duration::from_millis(self.poll_deadline_ms)
    }

    pub fn actor_fetch_deadline(&self) -> Duration {
        Duration::from_millis(self.actor_fetch_deadline_ms)
    }

    pub fn actor_retry_interval(&self) -> Duration {
        Duration::from_millis(self.actor_retry_interval_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }
        if self.poll_deadline_ms == 0 || self.actor_fetch_deadline_ms == 0 {
            anyhow::bail!("deadlines must be greater than zero");
        }
        if self.poll_deadline_ms >= self.poll_interval_ms {
            warn!(
                "poll deadline ({}ms) is not shorter than the poll interval ({}ms); peers still in flight will be skipped",
                self.poll_deadline_ms, self.poll_interval_ms
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ActorDirectoryConfig {
    pub url: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiSettings {
    pub bind: Option<SocketAddr>,
    pub token: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_deadline_ms() -> u64 {
    2000
}

fn default_actor_retry_interval_ms() -> u64 {
    1000
}

fn default_actor_topic_pattern() -> String {
    String::from("ACTOR:*")
}

fn default_log_topic() -> String {
    String::from("RAY_LOG_CHANNEL")
}

fn default_error_topic_pattern() -> String {
    String::from("ERROR_INFO:*")
}

fn default_max_log_lines() -> usize {
    1000
}

fn default_max_errors() -> usize {
    100
}

fn default_purge_stats() -> bool {
    true
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    let config: Config = serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?;
    config.collector.validate()?;
    trace!("loaded config: {config:?}");
    Ok(config)
}
