//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: control messages sent to one actor via mpsc
//! 2. **Replies**: oneshot channels carried inside the command
//! 3. **Status**: long-running phases published through `watch`

use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;

/// Outcome of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Peers a stats request was issued to
    pub polled: usize,

    /// Replies written to the store
    pub succeeded: usize,

    /// Timeouts, transport errors, bad replies
    pub failed: usize,

    /// Replies that arrived after their node left the peer table
    pub discarded: usize,

    /// Peers whose node is not ALIVE (or no longer registered)
    pub skipped_not_alive: usize,

    /// Peers still busy with a request from an earlier cycle
    pub skipped_in_flight: usize,
}

/// Commands that can be sent to the StatsPollerActor
#[derive(Debug)]
pub enum PollerCommand {
    /// Run a cycle immediately and report its outcome
    ///
    /// Used for testing and manual refresh operations.
    PollNow {
        respond_to: oneshot::Sender<CycleReport>,
    },

    /// Change the cycle period, effective from the next tick
    UpdateInterval { interval: Duration },

    /// Stop starting new cycles
    Shutdown,
}

/// Commands that can be sent to the PeerSyncActor
#[derive(Debug)]
pub enum PeerSyncCommand {
    /// Reply once every change event queued before this command is applied
    ///
    /// Answers with the number of peer handles held afterwards.
    Flush { respond_to: oneshot::Sender<usize> },

    Shutdown,
}

/// Commands understood by the subscription-driven actors
#[derive(Debug)]
pub enum RelayCommand {
    Shutdown,
}

/// Progress of the actor table synchronizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SyncPhase {
    /// Bulk fetch not yet successful; `failed_attempts` so far
    Bootstrapping { failed_attempts: u32 },

    /// Snapshot loaded, applying stream updates
    Live,

    /// Stream ended or the actor was shut down
    Stopped,
}
