//! PeerSyncActor - Keeps one stats stub per registered node
//!
//! The actor observes the node registry and mirrors its membership into a
//! [`PeerTable`]. It is the only writer of that table; the poller reads
//! snapshots of it.
//!
//! ## Message Flow
//!
//! ```text
//! NodeRegistry mutation → ChangeEvent → drop old handle → connect new handle → PeerTable
//!     ↑
//!     └─── Commands (Flush, Shutdown)
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, trace, warn};

use crate::NodeId;
use crate::store::{ChangeEvent, Store};
use crate::transport::{StatsStub, StubFactory};

use super::messages::PeerSyncCommand;

/// A live stub bound to one node
pub type PeerHandle = Arc<dyn StatsStub>;

/// Node id → stub mapping. At most one handle per node.
#[derive(Clone, Default)]
pub struct PeerTable {
    peers: Arc<DashMap<NodeId, PeerHandle>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone out every (id, handle) pair; handles are borrowed for one call
    pub fn snapshot(&self) -> Vec<(NodeId, PeerHandle)> {
        self.peers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn get(&self, id: &NodeId) -> Option<PeerHandle> {
        self.peers.get(id).map(|p| p.clone())
    }

    /// Run `f` only while `handle` is still the stub registered for `id`.
    ///
    /// The entry stays locked until `f` returns, so a concurrent departure
    /// either waits for `f` or makes this return `None`.
    pub fn while_current<R>(
        &self,
        id: &NodeId,
        handle: &PeerHandle,
        f: impl FnOnce() -> R,
    ) -> Option<R> {
        let current = self.peers.get(id)?;
        Arc::ptr_eq(current.value(), handle).then(f)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.peers.contains_key(id)
    }

    /// Ids with a handle, sorted
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.peers.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub(crate) fn insert(&self, id: NodeId, handle: PeerHandle) {
        self.peers.insert(id, handle);
    }

    pub(crate) fn remove(&self, id: &NodeId) -> Option<PeerHandle> {
        self.peers.remove(id).map(|(_, handle)| handle)
    }
}

pub struct PeerSyncActor {
    store: Arc<Store>,
    factory: Arc<dyn StubFactory>,
    peers: PeerTable,
    events: mpsc::Receiver<ChangeEvent>,
    command_rx: mpsc::Receiver<PeerSyncCommand>,
    purge_stats_on_departure: bool,
}

impl PeerSyncActor {
    pub fn new(
        store: Arc<Store>,
        factory: Arc<dyn StubFactory>,
        peers: PeerTable,
        events: mpsc::Receiver<ChangeEvent>,
        command_rx: mpsc::Receiver<PeerSyncCommand>,
        purge_stats_on_departure: bool,
    ) -> Self {
        Self {
            store,
            factory,
            peers,
            events,
            command_rx,
            purge_stats_on_departure,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting peer sync actor");

        loop {
            tokio::select! {
                // drain membership events before looking at commands, so
                // Flush observes every event queued ahead of it
                biased;

                Some(event) = self.events.recv() => {
                    self.apply(event);
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        PeerSyncCommand::Flush { respond_to } => {
                            let _ = respond_to.send(self.peers.len());
                        }
                        PeerSyncCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("registry and command channels closed, shutting down");
                    break;
                }
            }
        }

        debug!("peer sync actor stopped");
    }

    /// Apply one membership change to the peer table
    pub fn apply(&self, event: ChangeEvent) {
        if let Some((id, _)) = &event.old {
            if self.peers.remove(id).is_some() {
                debug!("dropped peer handle for node {id}");
            } else {
                trace!("no peer handle to drop for node {id}");
            }

            if event.new.is_none()
                && self.purge_stats_on_departure
                && self.store.remove_node_stats(id).is_some()
            {
                debug!("purged stats of departed node {id}");
            }
        }

        if let Some((id, record)) = event.new {
            match self
                .factory
                .connect(&record.node_manager_address, record.node_manager_port)
            {
                Ok(handle) => {
                    debug!("created peer handle for node {id} at {}", handle.endpoint());
                    self.peers.insert(id, handle);
                }
                Err(e) => {
                    warn!("node {id} is unreachable until its next update: {e}");
                }
            }
        }
    }
}

/// Handle for controlling a PeerSyncActor
#[derive(Clone)]
pub struct PeerSyncHandle {
    sender: mpsc::Sender<PeerSyncCommand>,
    peers: PeerTable,
}

impl PeerSyncHandle {
    /// Register with the store's node registry and spawn the actor
    pub async fn spawn(
        store: Arc<Store>,
        factory: Arc<dyn StubFactory>,
        purge_stats_on_departure: bool,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let events = store.nodes().observe().await;
        let peers = PeerTable::new();

        let actor = PeerSyncActor::new(
            store,
            factory,
            peers.clone(),
            events,
            cmd_rx,
            purge_stats_on_departure,
        );
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            peers,
        }
    }

    /// The table this actor maintains
    pub fn peers(&self) -> PeerTable {
        self.peers.clone()
    }

    /// Wait until every change event queued so far is applied
    pub async fn flush(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PeerSyncCommand::Flush { respond_to: tx })
            .await
            .context("failed to send Flush command")?;
        rx.await.context("failed to receive response")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(PeerSyncCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
