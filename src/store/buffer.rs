//! Per-process ring buffers for log lines and error records
//!
//! Entries are keyed by (host, pid), created on first append and never
//! removed. Each key holds at most `capacity` items; the oldest are evicted
//! first. A capacity of zero disables the cap.

use std::collections::{BTreeMap, VecDeque};

use dashmap::DashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessKey {
    pub host: String,
    pub pid: String,
}

impl ProcessKey {
    pub fn new(host: impl Into<String>, pid: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            pid: pid.into(),
        }
    }
}

pub struct ProcessBuffers<T> {
    entries: DashMap<ProcessKey, VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone> ProcessBuffers<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    /// Append `items` in order, returning how many old items were evicted
    pub fn append(&self, key: ProcessKey, items: impl IntoIterator<Item = T>) -> usize {
        let mut buffer = self.entries.entry(key).or_default();
        buffer.extend(items);

        if self.capacity == 0 || buffer.len() <= self.capacity {
            return 0;
        }

        let evicted = buffer.len() - self.capacity;
        buffer.drain(..evicted);
        evicted
    }

    pub fn get(&self, key: &ProcessKey) -> Vec<T> {
        self.entries
            .get(key)
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All buffers of one host, keyed by pid
    pub fn for_host(&self, host: &str) -> BTreeMap<String, Vec<T>> {
        self.entries
            .iter()
            .filter(|entry| entry.key().host == host)
            .map(|entry| (entry.key().pid.clone(), entry.value().iter().cloned().collect()))
            .collect()
    }

    /// Number of items stored for one host across all its processes
    pub fn count_for_host(&self, host: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.key().host == host)
            .map(|entry| entry.value().len())
            .sum()
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }
}
