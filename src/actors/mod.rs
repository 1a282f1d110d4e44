//! Actor-based acquisition pipeline
//!
//! Each acquisition component runs as an independent async task and is
//! controlled through a cloneable handle over an mpsc command channel.
//! Actors never talk to each other; they only meet in the shared
//! [`Store`](crate::store::Store) and the [`PeerTable`](peers::PeerTable).
//!
//! ## Architecture Overview
//!
//! ```text
//!   NodeRegistry ──ChangeEvent──▶ PeerSyncActor ──▶ PeerTable
//!                                                      │ snapshot
//!                                                      ▼
//!   stats agents ◀──get_stats(D)── StatsPollerActor ──▶ Store.node_stats
//!   actor directory + ACTOR:*  ──▶ ActorTableActor  ──▶ Store.actors
//!   log topic                  ──▶ LogRelayActor    ──▶ Store.logs
//!   error pattern              ──▶ ErrorRelayActor  ──▶ Store.errors
//! ```
//!
//! ## Actor Types
//!
//! - **PeerSyncActor**: one stats stub per registered node
//! - **StatsPollerActor**: periodic fan-out of stats requests
//! - **ActorTableActor**: bulk bootstrap, then live actor upserts
//! - **LogRelayActor** / **ErrorRelayActor**: append published batches/events
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel
//! 2. **Request/Response**: oneshot channels for PollNow and Flush
//! 3. **Status**: the actor table's phase is published on a watch channel

pub mod actor_table;
pub mod error_relay;
pub mod log_relay;
pub mod messages;
pub mod peers;
pub mod poller;
