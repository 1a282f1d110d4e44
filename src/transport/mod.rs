//! Interfaces to the collector's external collaborators
//!
//! The acquisition actors never talk to the network directly. They go
//! through these traits, which keeps them testable with in-process fakes:
//!
//! - [`StatsStub`] / [`StubFactory`]: per-node stats agent
//! - [`ActorDirectory`]: bulk actor table query
//! - [`MessageBus`]: topic/pattern subscriptions
//!
//! `http` holds the reqwest-backed agent and directory clients, `bus` an
//! in-process broadcast bus.

pub mod bus;
pub mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::Value;

use crate::ActorRecord;
use crate::error::CollectorResult;

pub use bus::LocalBus;
pub use http::{HttpActorDirectory, HttpStatsStub, HttpStubFactory};

/// Remote stub of one node's stats agent
#[async_trait]
pub trait StatsStub: Send + Sync {
    /// Fetch a stats snapshot, failing once `deadline` has passed
    async fn get_stats(&self, include_memory_info: bool, deadline: Duration)
    -> CollectorResult<Value>;

    /// Human readable endpoint, for logs
    fn endpoint(&self) -> String;
}

/// Builds stubs for newly discovered nodes.
///
/// `connect` must not block on network I/O; connections are expected to be
/// established lazily on first use.
pub trait StubFactory: Send + Sync {
    fn connect(&self, address: &str, port: i64) -> CollectorResult<Arc<dyn StatsStub>>;
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReplyStatus {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl ReplyStatus {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorTableReply {
    #[serde(default)]
    pub status: ReplyStatus,
    #[serde(default)]
    pub actor_table_data: Vec<ActorRecord>,
}

/// Source of the full actor table
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    async fn get_all_actors(&self, deadline: Duration) -> CollectorResult<ActorTableReply>;
}

/// A message delivered by the bus
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub type BusStream = BoxStream<'static, BusMessage>;

/// Publish/subscribe transport.
///
/// Once `subscribe`/`psubscribe` returns, every later matching message is
/// delivered on the stream, in publish order, until the bus goes away.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn subscribe(&self, topic: &str) -> CollectorResult<BusStream>;

    async fn psubscribe(&self, pattern: &str) -> CollectorResult<BusStream>;
}
