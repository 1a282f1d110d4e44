//! Wires every acquisition component against one [`Store`]

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::actors::actor_table::ActorTableHandle;
use crate::actors::error_relay::ErrorRelayHandle;
use crate::actors::log_relay::LogRelayHandle;
use crate::actors::peers::{PeerSyncHandle, PeerTable};
use crate::actors::poller::PollerHandle;
use crate::config::{CollectorConfig, NodeConfig};
use crate::query::Query;
use crate::store::{Store, StoreLimits};
use crate::transport::{ActorDirectory, MessageBus, StubFactory};

/// External collaborators the collector talks to
pub struct Collaborators {
    pub stubs: Arc<dyn StubFactory>,
    pub actor_directory: Arc<dyn ActorDirectory>,
    pub bus: Arc<dyn MessageBus>,
}

/// The running collector: one store plus a handle per component
pub struct Collector {
    store: Arc<Store>,
    pub peer_sync: PeerSyncHandle,
    pub poller: PollerHandle,
    pub actor_table: ActorTableHandle,
    pub log_relay: LogRelayHandle,
    pub error_relay: ErrorRelayHandle,
}

impl Collector {
    /// Seed the registry with `nodes` and start every component.
    ///
    /// The peer synchronizer registers before the seed is inserted and
    /// every subscription is open before this returns.
    pub async fn spawn(
        config: &CollectorConfig,
        nodes: &[NodeConfig],
        collaborators: Collaborators,
    ) -> Result<Self> {
        let store = Arc::new(Store::new(StoreLimits {
            max_log_lines_per_process: config.max_log_lines_per_process,
            max_errors_per_process: config.max_errors_per_process,
        }));

        let peer_sync = PeerSyncHandle::spawn(
            store.clone(),
            collaborators.stubs,
            config.purge_stats_on_departure,
        )
        .await;

        for node in nodes {
            debug!("seeding node {} ({}:{})", node.id, node.address, node.port);
            store.nodes().insert(node.to_record()).await;
        }

        let poller = PollerHandle::spawn(
            store.clone(),
            peer_sync.peers(),
            config.poll_interval(),
            config.poll_deadline(),
            config.include_memory_info,
        );

        let bus = collaborators.bus.as_ref();
        let actor_table = ActorTableHandle::spawn(
            store.clone(),
            collaborators.actor_directory,
            bus,
            &config.actor_topic_pattern,
            config.actor_fetch_deadline(),
            config.actor_retry_interval(),
        )
        .await
        .context("failed to start the actor table synchronizer")?;

        let log_relay = LogRelayHandle::spawn(store.clone(), bus, &config.log_topic)
            .await
            .context("failed to start the log relay")?;

        let error_relay = ErrorRelayHandle::spawn(store.clone(), bus, &config.error_topic_pattern)
            .await
            .context("failed to start the error relay")?;

        info!("collector started with {} seeded nodes", nodes.len());

        Ok(Self {
            store,
            peer_sync,
            poller,
            actor_table,
            log_relay,
            error_relay,
        })
    }

    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    pub fn peers(&self) -> PeerTable {
        self.peer_sync.peers()
    }

    pub fn query(&self) -> Query {
        Query::new(self.store.clone(), self.poller.memory_info_flag())
    }

    /// Stop every component; keeps going if one of them is already gone
    pub async fn shutdown(&self) {
        let results = [
            ("poller", self.poller.shutdown().await),
            ("actor table", self.actor_table.shutdown().await),
            ("log relay", self.log_relay.shutdown().await),
            ("error relay", self.error_relay.shutdown().await),
            ("peer sync", self.peer_sync.shutdown().await),
        ];

        for (component, result) in results {
            if let Err(e) = result {
                error!("error shutting down {component}: {e}");
            }
        }
        info!("collector stopped");
    }
}
