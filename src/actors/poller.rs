//! StatsPollerActor - Polls every live peer for node stats
//!
//! ## Cycle
//!
//! Every tick starts a cycle in its own task: snapshot the peer table,
//! fan out one deadline-bounded request per ALIVE node, and wait for all of
//! them. A slow peer therefore only holds its own slot, and never the
//! ticker. When the deadline exceeds the period, a peer whose previous
//! request is still running is skipped instead of being polled twice.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → snapshot peers → [get_stats(D) per peer] → replace NodeStats
//!     ↑
//!     └─── Commands (PollNow, UpdateInterval, Shutdown)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use dashmap::DashSet;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, error, instrument, trace, warn};

use crate::NodeId;
use crate::error::with_deadline;
use crate::store::Store;

use super::messages::{CycleReport, PollerCommand};
use super::peers::{PeerHandle, PeerTable};

/// Runs poll cycles. Cheap to clone; clones share the in-flight set.
#[derive(Clone)]
pub struct StatsPoller {
    store: Arc<Store>,
    peers: PeerTable,
    include_memory_info: Arc<AtomicBool>,
    deadline: Duration,
    in_flight: Arc<DashSet<NodeId>>,
}

impl StatsPoller {
    pub fn new(
        store: Arc<Store>,
        peers: PeerTable,
        include_memory_info: Arc<AtomicBool>,
        deadline: Duration,
    ) -> Self {
        Self {
            store,
            peers,
            include_memory_info,
            deadline,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Poll every eligible peer once, each in its own task, and wait for all of them
    #[instrument(skip(self))]
    pub async fn poll_cycle(&self) -> CycleReport {
        let include_memory_info = self.include_memory_info.load(Ordering::Relaxed);
        let mut report = CycleReport::default();
        let mut polls = JoinSet::new();

        for (id, peer) in self.peers.snapshot() {
            let alive = self
                .store
                .nodes()
                .get(&id)
                .is_some_and(|node| node.is_alive());
            if !alive {
                trace!("skipping node {id}: not alive");
                report.skipped_not_alive += 1;
                continue;
            }

            let Some(guard) = InFlight::acquire(&self.in_flight, &id) else {
                debug!("skipping node {id}: previous request still in flight");
                report.skipped_in_flight += 1;
                continue;
            };

            let poller = self.clone();
            polls.spawn(async move {
                poller
                    .poll_peer(id, peer, include_memory_info, guard)
                    .await
            });
        }

        report.polled = polls.len();
        while let Some(result) = polls.join_next().await {
            match result {
                Ok(PollOutcome::Stored) => report.succeeded += 1,
                Ok(PollOutcome::Failed) => report.failed += 1,
                Ok(PollOutcome::Discarded) => report.discarded += 1,
                Err(e) => {
                    error!("poll task failed: {e}");
                    report.failed += 1;
                }
            }
        }

        trace!("poll cycle finished: {report:?}");
        report
    }

    async fn poll_peer(
        &self,
        id: NodeId,
        peer: PeerHandle,
        include_memory_info: bool,
        _guard: InFlight,
    ) -> PollOutcome {
        let request = peer.get_stats(include_memory_info, self.deadline);

        match with_deadline(self.deadline, request).await {
            Ok(stats) => {
                // a departed node's stats may already be purged; don't bring them back
                let stored = self.peers.while_current(&id, &peer, || {
                    self.store.set_node_stats(id.clone(), stats);
                });
                if stored.is_some() {
                    PollOutcome::Stored
                } else {
                    debug!("discarding stats of node {id}: peer handle is gone");
                    PollOutcome::Discarded
                }
            }
            Err(e) => {
                error!("error updating node stats of {id} ({}): {e}", peer.endpoint());
                PollOutcome::Failed
            }
        }
    }
}

enum PollOutcome {
    Stored,
    Failed,
    Discarded,
}

/// Marks a node as busy for as long as it is alive
struct InFlight {
    set: Arc<DashSet<NodeId>>,
    id: NodeId,
}

impl InFlight {
    fn acquire(set: &Arc<DashSet<NodeId>>, id: &NodeId) -> Option<Self> {
        set.insert(id.clone()).then(|| Self {
            set: set.clone(),
            id: id.clone(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

pub struct StatsPollerActor {
    poller: StatsPoller,
    command_rx: mpsc::Receiver<PollerCommand>,
    interval_duration: Duration,
}

impl StatsPollerActor {
    pub fn new(
        poller: StatsPoller,
        command_rx: mpsc::Receiver<PollerCommand>,
        interval_duration: Duration,
    ) -> Self {
        Self {
            poller,
            command_rx,
            interval_duration,
        }
    }

    /// Run the actor's main loop
    ///
    /// This runs until a Shutdown command is received or the command
    /// channel is closed. Cycles already started finish on their own.
    #[instrument(skip(self), fields(period = ?self.interval_duration))]
    pub async fn run(mut self) {
        debug!("starting stats poller actor");

        let mut ticker = new_ticker(self.interval_duration);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let poller = self.poller.clone();
                    tokio::spawn(async move {
                        poller.poll_cycle().await;
                    });
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        PollerCommand::PollNow { respond_to } => {
                            debug!("received PollNow command");
                            let report = self.poller.poll_cycle().await;
                            let _ = respond_to.send(report);
                        }

                        PollerCommand::UpdateInterval { interval: period } => {
                            debug!("updating poll interval to {period:?}");
                            self.interval_duration = period;
                            ticker = new_ticker(period);
                        }

                        PollerCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("stats poller actor stopped");
    }
}

/// First tick one period from now; the peer table starts out empty anyway
fn new_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Handle for controlling a StatsPollerActor
#[derive(Clone)]
pub struct PollerHandle {
    sender: mpsc::Sender<PollerCommand>,
    include_memory_info: Arc<AtomicBool>,
}

impl PollerHandle {
    /// Spawn a poller over `peers`
    pub fn spawn(
        store: Arc<Store>,
        peers: PeerTable,
        period: Duration,
        deadline: Duration,
        include_memory_info: bool,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let flag = Arc::new(AtomicBool::new(include_memory_info));

        let poller = StatsPoller::new(store, peers, flag.clone(), deadline);
        let actor = StatsPollerActor::new(poller, cmd_rx, period);
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            include_memory_info: flag,
        }
    }

    /// Run a cycle now and return its report
    pub async fn poll_now(&self) -> Result<CycleReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PollerCommand::PollNow { respond_to: tx })
            .await
            .context("failed to send PollNow command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn update_interval(&self, period: Duration) -> Result<()> {
        self.sender
            .send(PollerCommand::UpdateInterval { interval: period })
            .await
            .context("failed to send UpdateInterval command")?;
        Ok(())
    }

    /// Ask agents for memory introspection data from the next cycle on
    pub fn set_memory_info_collection(&self, enabled: bool) {
        self.include_memory_info.store(enabled, Ordering::Relaxed);
    }

    pub fn memory_info_collection(&self) -> bool {
        self.include_memory_info.load(Ordering::Relaxed)
    }

    pub(crate) fn memory_info_flag(&self) -> Arc<AtomicBool> {
        self.include_memory_info.clone()
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(PollerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
