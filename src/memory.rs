//! Object memory table built from workers' object reference stats
//!
//! Node stats fetched with memory introspection enabled contain a
//! `coreWorkersStats` list; every worker reports the object references it
//! holds. The table flattens those references, classifies each one, and
//! groups them by node or by creation call site.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupByType {
    #[serde(rename = "node")]
    NodeAddress,
    #[default]
    StackTrace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortingType {
    Pid,
    #[default]
    ObjectSize,
    ReferenceType,
}

/// Why an object is still held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    ActorHandle,
    PinnedInMemory,
    UsedByPendingTask,
    LocalReference,
    CapturedInObject,
    UnknownStatus,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::ActorHandle => "ACTOR_HANDLE",
            ReferenceType::PinnedInMemory => "PINNED_IN_MEMORY",
            ReferenceType::UsedByPendingTask => "USED_BY_PENDING_TASK",
            ReferenceType::LocalReference => "LOCAL_REFERENCE",
            ReferenceType::CapturedInObject => "CAPTURED_IN_OBJECT",
            ReferenceType::UnknownStatus => "UNKNOWN_STATUS",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WorkerStats {
    pid: u64,
    ip_address: String,
    object_refs: Vec<ObjectRefStats>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectRefStats {
    object_id: String,
    #[serde(default = "disabled_call_site")]
    call_site: String,
    #[serde(default = "unknown_object_size")]
    object_size: i64,
    #[serde(default)]
    local_ref_count: u64,
    #[serde(default)]
    submitted_task_ref_count: u64,
    #[serde(default)]
    contained_in_owned: Vec<Value>,
    #[serde(default)]
    pinned_in_memory: bool,
}

fn disabled_call_site() -> String {
    String::from("disabled")
}

fn unknown_object_size() -> i64 {
    -1
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryTableEntry {
    pub object_ref: String,
    pub pid: u64,
    pub node_address: String,
    pub call_site: String,
    /// -1 when the owner does not know the size yet
    pub object_size: i64,
    pub reference_type: ReferenceType,
    pub local_ref_count: u64,
    pub submitted_task_ref_count: u64,
    pub contained_in_owned: usize,
    pub pinned_in_memory: bool,
}

/// Hex chars of an object id holding the creating task's unique bits
const TASK_UNIQUE_HEX_LEN: usize = 16;

/// Hex chars of the actor's unique bits following them
const ACTOR_UNIQUE_HEX_LEN: usize = 24;

impl MemoryTableEntry {
    fn new(worker: &WorkerStats, object: ObjectRefStats) -> Self {
        let reference_type = classify(&object);
        Self {
            object_ref: object.object_id,
            pid: worker.pid,
            node_address: worker.ip_address.clone(),
            call_site: object.call_site,
            object_size: object.object_size,
            reference_type,
            local_ref_count: object.local_ref_count,
            submitted_task_ref_count: object.submitted_task_ref_count,
            contained_in_owned: object.contained_in_owned.len(),
            pinned_in_memory: object.pinned_in_memory,
        }
    }

    fn group_key(&self, group_by: GroupByType) -> &str {
        match group_by {
            GroupByType::NodeAddress => &self.node_address,
            GroupByType::StackTrace => &self.call_site,
        }
    }
}

fn classify(object: &ObjectRefStats) -> ReferenceType {
    if is_actor_handle(&object.object_id) {
        ReferenceType::ActorHandle
    } else if object.pinned_in_memory {
        ReferenceType::PinnedInMemory
    } else if object.submitted_task_ref_count > 0 {
        ReferenceType::UsedByPendingTask
    } else if object.local_ref_count > 0 {
        ReferenceType::LocalReference
    } else if !object.contained_in_owned.is_empty() {
        ReferenceType::CapturedInObject
    } else {
        ReferenceType::UnknownStatus
    }
}

/// Actor creation returns carry all-ones task bits followed by real actor bits
fn is_actor_handle(object_id: &str) -> bool {
    let Some(task_bits) = object_id.get(..TASK_UNIQUE_HEX_LEN) else {
        return false;
    };
    let Some(actor_bits) =
        object_id.get(TASK_UNIQUE_HEX_LEN..TASK_UNIQUE_HEX_LEN + ACTOR_UNIQUE_HEX_LEN)
    else {
        return false;
    };

    task_bits.chars().all(|c| c.eq_ignore_ascii_case(&'f'))
        && !actor_bits.chars().all(|c| c.eq_ignore_ascii_case(&'f'))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemorySummary {
    pub total_object_size: i64,
    pub total_local_ref_count: usize,
    pub total_pinned_in_memory: usize,
    pub total_used_by_pending_task: usize,
    pub total_captured_in_objects: usize,
    pub total_actor_handles: usize,
}

impl MemorySummary {
    fn add(&mut self, entry: &MemoryTableEntry) {
        if entry.object_size > 0 {
            self.total_object_size += entry.object_size;
        }
        match entry.reference_type {
            ReferenceType::ActorHandle => self.total_actor_handles += 1,
            ReferenceType::PinnedInMemory => self.total_pinned_in_memory += 1,
            ReferenceType::UsedByPendingTask => self.total_used_by_pending_task += 1,
            ReferenceType::LocalReference => self.total_local_ref_count += 1,
            ReferenceType::CapturedInObject => self.total_captured_in_objects += 1,
            ReferenceType::UnknownStatus => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryGroup {
    pub entries: Vec<MemoryTableEntry>,
    pub summary: MemorySummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryTable {
    pub group: BTreeMap<String, MemoryGroup>,
    pub summary: MemorySummary,
}

/// Build the table from every worker's stats (`coreWorkersStats` entries)
pub fn construct_memory_table(
    workers: &[Value],
    group_by: GroupByType,
    sort_by: SortingType,
) -> MemoryTable {
    let mut table = MemoryTable::default();

    for worker in workers {
        let worker: WorkerStats = match serde_json::from_value(worker.clone()) {
            Ok(worker) => worker,
            Err(e) => {
                warn!("skipping undecodable worker stats: {e}");
                continue;
            }
        };

        for object in worker.object_refs.clone() {
            let entry = MemoryTableEntry::new(&worker, object);
            table.summary.add(&entry);

            let group = table
                .group
                .entry(entry.group_key(group_by).to_string())
                .or_default();
            group.summary.add(&entry);
            group.entries.push(entry);
        }
    }

    for group in table.group.values_mut() {
        sort_entries(&mut group.entries, sort_by);
    }
    table
}

fn sort_entries(entries: &mut [MemoryTableEntry], sort_by: SortingType) {
    match sort_by {
        SortingType::Pid => entries.sort_by_key(|e| e.pid),
        SortingType::ObjectSize => entries.sort_by_key(|e| e.object_size),
        SortingType::ReferenceType => entries.sort_by_key(|e| e.reference_type.as_str()),
    }
}
