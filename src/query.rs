//! Read-only views over the [`Store`]
//!
//! Nothing here performs I/O or waits on another component: every accessor
//! takes a point-in-time copy of the maps it needs and shapes it into the
//! JSON the request layer hands out.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::memory::{GroupByType, MemoryTable, SortingType, construct_memory_table};
use crate::store::{ProcessBuffers, ProcessKey, Store};
use crate::{ErrorRecord, NodeId, NodeRecord};

/// Fields dropped from the stats reply in the node summary
const HEAVY_STATS_FIELDS: [&str; 2] = ["coreWorkersStats", "viewData"];

/// Lines or errors of one process, or of every process on a host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProcessView<T> {
    Process(Vec<T>),
    Host(BTreeMap<String, Vec<T>>),
}

impl<T> ProcessView<T> {
    pub fn len(&self) -> usize {
        match self {
            ProcessView::Process(items) => items.len(),
            ProcessView::Host(by_pid) => by_pid.values().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub struct Query {
    store: Arc<Store>,
    include_memory_info: Arc<AtomicBool>,
}

impl Query {
    pub fn new(store: Arc<Store>, include_memory_info: Arc<AtomicBool>) -> Self {
        Self {
            store,
            include_memory_info,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Hostnames of every node currently ALIVE
    pub fn get_alive_hostnames(&self) -> BTreeSet<String> {
        self.store
            .nodes()
            .all()
            .into_iter()
            .filter(NodeRecord::is_alive)
            .map(|node| node.node_manager_hostname)
            .collect()
    }

    /// One entry per known node, without the per-worker payloads
    pub fn get_all_node_summary(&self) -> Vec<Value> {
        self.store
            .nodes()
            .all()
            .iter()
            .map(|node| {
                let mut details = self.node_details(node);
                strip_heavy_fields(&mut details);
                details
            })
            .collect()
    }

    pub fn get_all_node_details(&self) -> Vec<Value> {
        self.store
            .nodes()
            .all()
            .iter()
            .map(|node| self.node_details(node))
            .collect()
    }

    /// Registry record merged with the node's stats, actors and counters
    pub fn get_node(&self, id: &NodeId) -> Option<Value> {
        let node = self.store.nodes().get(id)?;
        Some(self.node_details(&node))
    }

    fn node_details(&self, node: &NodeRecord) -> Value {
        let mut details = match serde_json::to_value(node) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!("node record of {} did not serialize to an object", node.node_id);
                Map::new()
            }
        };

        let stats = self
            .store
            .node_stats(&node.node_id)
            .map(|s| s.stats)
            .unwrap_or_else(|| json!({}));
        let actors: Map<String, Value> = self
            .store
            .actors_on_node(&node.node_id)
            .into_iter()
            .filter_map(|(id, actor)| Some((id.0, serde_json::to_value(actor).ok()?)))
            .collect();

        let host = &node.node_manager_address;
        details.insert("raylet".into(), stats);
        details.insert("actors".into(), Value::Object(actors));
        details.insert("logCount".into(), self.store.logs().count_for_host(host).into());
        details.insert("errorCount".into(), self.store.errors().count_for_host(host).into());

        Value::Object(details)
    }

    pub fn get_memory_table(
        &self,
        group_by: Option<GroupByType>,
        sort_by: Option<SortingType>,
    ) -> MemoryTable {
        let workers: Vec<Value> = self
            .store
            .all_node_stats()
            .into_iter()
            .filter_map(|(_, stats)| match stats.stats.get("coreWorkersStats") {
                Some(Value::Array(workers)) => Some(workers.clone()),
                _ => None,
            })
            .flatten()
            .collect();

        construct_memory_table(
            &workers,
            group_by.unwrap_or_default(),
            sort_by.unwrap_or_default(),
        )
    }

    pub fn get_logs(&self, host: &str, pid: Option<&str>) -> ProcessView<String> {
        view(self.store.logs(), host, pid)
    }

    pub fn get_errors(&self, host: &str, pid: Option<&str>) -> ProcessView<ErrorRecord> {
        view(self.store.errors(), host, pid)
    }

    /// Takes effect on the poller's next cycle
    pub fn set_memory_info_collection(&self, enabled: bool) {
        debug!("memory info collection set to {enabled}");
        self.include_memory_info.store(enabled, Ordering::Relaxed);
    }

    pub fn memory_info_collection(&self) -> bool {
        self.include_memory_info.load(Ordering::Relaxed)
    }
}

fn view<T: Clone>(buffers: &ProcessBuffers<T>, host: &str, pid: Option<&str>) -> ProcessView<T> {
    match pid {
        Some(pid) => ProcessView::Process(buffers.get(&ProcessKey::new(host, pid))),
        None => ProcessView::Host(buffers.for_host(host)),
    }
}

fn strip_heavy_fields(details: &mut Value) {
    let Some(details) = details.as_object_mut() else {
        return;
    };
    details.remove("actors");
    if let Some(Value::Object(raylet)) = details.get_mut("raylet") {
        for field in HEAVY_STATS_FIELDS {
            raylet.remove(field);
        }
    }
}
