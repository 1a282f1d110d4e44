//! Node registry with change notifications
//!
//! The registry is owned by whatever feeds cluster membership (the config
//! seed and the admin API in this crate). The collector only reads it and
//! reacts to its [`ChangeEvent`]s.
//!
//! ## Delivery
//!
//! Every observer gets its own bounded queue. Mutations are serialized by
//! the observer lock, so each observer sees events in mutation order. An
//! observer that falls behind applies backpressure to writers instead of
//! losing events. Delivery is asynchronous: the observer processes the
//! event some time after the mutation returns.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};

use crate::{NodeId, NodeRecord};

/// Capacity of each observer's queue
const OBSERVER_QUEUE_CAPACITY: usize = 256;

/// A single membership change.
///
/// An insert of a new id carries only `new`, a removal only `old`, and an
/// update of an existing id carries both.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub old: Option<(NodeId, NodeRecord)>,
    pub new: Option<(NodeId, NodeRecord)>,
}

#[derive(Clone, Default)]
pub struct NodeRegistry {
    nodes: Arc<DashMap<NodeId, NodeRecord>>,
    observers: Arc<Mutex<Vec<mpsc::Sender<ChangeEvent>>>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    ///
    /// Nodes already present are replayed as insert events before any later
    /// mutation, so an observer registered after seeding misses nothing.
    pub async fn observe(&self) -> mpsc::Receiver<ChangeEvent> {
        let mut observers = self.observers.lock().await;
        let existing = self.all();

        // room for the whole replay, so the try_sends below cannot fail
        let (tx, rx) = mpsc::channel(existing.len() + OBSERVER_QUEUE_CAPACITY);
        for record in existing {
            let event = ChangeEvent {
                old: None,
                new: Some((record.node_id.clone(), record)),
            };
            let _ = tx.try_send(event);
        }

        observers.push(tx);
        debug!("registered node observer ({} total)", observers.len());
        rx
    }

    /// Insert or replace a node, returning the previous record
    pub async fn insert(&self, record: NodeRecord) -> Option<NodeRecord> {
        let mut observers = self.observers.lock().await;
        let id = record.node_id.clone();
        let old = self.nodes.insert(id.clone(), record.clone());

        trace!("node {id} upserted (existing: {})", old.is_some());

        let event = ChangeEvent {
            old: old.clone().map(|o| (id.clone(), o)),
            new: Some((id, record)),
        };
        notify(&mut observers, event).await;
        old
    }

    /// Remove a node. Removing an unknown id emits nothing.
    pub async fn remove(&self, id: &NodeId) -> Option<NodeRecord> {
        let mut observers = self.observers.lock().await;
        let (id, old) = self.nodes.remove(id)?;

        trace!("node {id} removed");

        let event = ChangeEvent {
            old: Some((id, old.clone())),
            new: None,
        };
        notify(&mut observers, event).await;
        Some(old)
    }

    /// Make the registry contain exactly `records`
    pub async fn reset(&self, records: Vec<NodeRecord>) {
        let keep: std::collections::HashSet<NodeId> =
            records.iter().map(|r| r.node_id.clone()).collect();

        let stale: Vec<NodeId> = self
            .nodes
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|id| !keep.contains(id))
            .collect();

        for id in stale {
            self.remove(&id).await;
        }

        for record in records {
            if self.get(&record.node_id).as_ref() != Some(&record) {
                self.insert(record).await;
            }
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<NodeRecord> {
        self.nodes.get(id).map(|r| r.clone())
    }

    /// All nodes, sorted by id
    pub fn all(&self) -> Vec<NodeRecord> {
        let mut nodes: Vec<NodeRecord> = self.nodes.iter().map(|r| r.clone()).collect();
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

async fn notify(observers: &mut Vec<mpsc::Sender<ChangeEvent>>, event: ChangeEvent) {
    let mut closed = false;
    for observer in observers.iter() {
        if observer.send(event.clone()).await.is_err() {
            closed = true;
        }
    }

    if closed {
        observers.retain(|o| !o.is_closed());
        debug!("dropped closed node observers ({} left)", observers.len());
    }
}
