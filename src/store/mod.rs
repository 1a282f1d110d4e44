//! Shared in-memory snapshot of the cluster
//!
//! ## Design
//!
//! - **Per-key locking**: every map is a `DashMap`, so writers touching
//!   different keys never serialize behind one another
//! - **No I/O under lock**: all operations are point reads/writes
//! - **Whole-value replacement**: stats and actor records are swapped in
//!   atomically, readers never see a half-written value
//!
//! ## Maps
//!
//! - **nodes**: [`NodeRegistry`], fed externally, emits [`ChangeEvent`]s
//! - **node stats**: latest reply per node, replaced on every poll
//! - **actors**: actor table, replaced per actor id
//! - **logs / errors**: [`ProcessBuffers`] keyed by (host, pid)

pub mod buffer;
pub mod registry;

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::{ActorId, ActorRecord, ErrorRecord, LogBatch, NodeId};

pub use buffer::{ProcessBuffers, ProcessKey};
pub use registry::{ChangeEvent, NodeRegistry};

/// The latest stats reply of one node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStats {
    pub stats: Value,
    pub updated_at: DateTime<Utc>,
}

/// Caps for the per-process buffers (0 = unbounded)
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    pub max_log_lines_per_process: usize,
    pub max_errors_per_process: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_log_lines_per_process: 1000,
            max_errors_per_process: 100,
        }
    }
}

pub struct Store {
    nodes: NodeRegistry,
    node_stats: DashMap<NodeId, NodeStats>,
    actors: DashMap<ActorId, ActorRecord>,
    logs: ProcessBuffers<String>,
    errors: ProcessBuffers<ErrorRecord>,
}

impl Store {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            nodes: NodeRegistry::new(),
            node_stats: DashMap::new(),
            actors: DashMap::new(),
            logs: ProcessBuffers::new(limits.max_log_lines_per_process),
            errors: ProcessBuffers::new(limits.max_errors_per_process),
        }
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    // ── Node stats ───────────────────────────────────────────

    /// Replace the stats of a node wholesale
    pub fn set_node_stats(&self, id: NodeId, stats: Value) {
        trace!("replacing stats of node {id}");
        self.node_stats.insert(
            id,
            NodeStats {
                stats,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn node_stats(&self, id: &NodeId) -> Option<NodeStats> {
        self.node_stats.get(id).map(|s| s.clone())
    }

    pub fn remove_node_stats(&self, id: &NodeId) -> Option<NodeStats> {
        self.node_stats.remove(id).map(|(_, s)| s)
    }

    /// Snapshot of every node's stats, sorted by node id
    pub fn all_node_stats(&self) -> Vec<(NodeId, NodeStats)> {
        let mut stats: Vec<_> = self
            .node_stats
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }

    // ── Actors ───────────────────────────────────────────────

    /// Replace the whole actor table.
    ///
    /// New records are written before stale ones are dropped, so a reader
    /// running concurrently never sees an empty table.
    pub fn reset_actors(&self, records: Vec<ActorRecord>) {
        let keep: HashSet<ActorId> = records.iter().map(|r| r.actor_id.clone()).collect();
        for record in records {
            self.actors.insert(record.actor_id.clone(), record);
        }
        self.actors.retain(|id, _| keep.contains(id));
    }

    /// Insert or fully replace one actor
    pub fn upsert_actor(&self, record: ActorRecord) {
        self.actors.insert(record.actor_id.clone(), record);
    }

    pub fn actor(&self, id: &ActorId) -> Option<ActorRecord> {
        self.actors.get(id).map(|a| a.clone())
    }

    pub fn actors(&self) -> BTreeMap<ActorId, ActorRecord> {
        self.actors
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Actors currently placed on `node`
    pub fn actors_on_node(&self, node: &NodeId) -> BTreeMap<ActorId, ActorRecord> {
        self.actors
            .iter()
            .filter(|entry| entry.value().node_id() == Some(node))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    // ── Logs & errors ────────────────────────────────────────

    pub fn append_logs(&self, batch: LogBatch) -> usize {
        self.logs
            .append(ProcessKey::new(batch.host, batch.pid), batch.lines)
    }

    pub fn append_error(&self, key: ProcessKey, record: ErrorRecord) -> usize {
        self.errors.append(key, std::iter::once(record))
    }

    pub fn logs(&self) -> &ProcessBuffers<String> {
        &self.logs
    }

    pub fn errors(&self) -> &ProcessBuffers<ErrorRecord> {
        &self.errors
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreLimits::default())
    }
}
