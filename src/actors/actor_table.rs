//! ActorTableActor - Mirrors the cluster's actor table
//!
//! ## Phases
//!
//! 1. **Bootstrap**: the actor-event subscription is opened first (in
//!    [`ActorTableHandle::spawn`]) so nothing published during the bulk
//!    fetch is lost. The bulk fetch is then retried with a fixed backoff
//!    until it returns an OK status; its result replaces the whole table.
//! 2. **Live**: each event on the subscription decodes to one
//!    [`ActorRecord`] that replaces the stored entry for its id.
//!
//! Events buffered during bootstrap are applied after the snapshot, so the
//! table converges to the newest state either way.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::ActorRecord;
use crate::error::{CollectorError, CollectorResult, with_deadline};
use crate::store::Store;
use crate::transport::{ActorDirectory, BusStream, MessageBus};

use super::messages::{RelayCommand, SyncPhase};

pub struct ActorTableActor {
    store: Arc<Store>,
    directory: Arc<dyn ActorDirectory>,
    events: BusStream,
    command_rx: mpsc::Receiver<RelayCommand>,
    phase_tx: watch::Sender<SyncPhase>,
    fetch_deadline: Duration,
    retry_interval: Duration,
}

impl ActorTableActor {
    pub fn new(
        store: Arc<Store>,
        directory: Arc<dyn ActorDirectory>,
        events: BusStream,
        command_rx: mpsc::Receiver<RelayCommand>,
        phase_tx: watch::Sender<SyncPhase>,
        fetch_deadline: Duration,
        retry_interval: Duration,
    ) -> Self {
        Self {
            store,
            directory,
            events,
            command_rx,
            phase_tx,
            fetch_deadline,
            retry_interval,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting actor table actor");

        if self.bootstrap().await {
            self.phase_tx.send_replace(SyncPhase::Live);
            self.consume().await;
        }

        self.phase_tx.send_replace(SyncPhase::Stopped);
        debug!("actor table actor stopped");
    }

    /// Fetch the full table until it succeeds. Returns false on shutdown.
    async fn bootstrap(&mut self) -> bool {
        let mut failed_attempts = 0u32;

        loop {
            info!("getting all actor info");

            let directory = self.directory.clone();
            match Self::fetch_all(directory, self.fetch_deadline).await {
                Ok(records) => {
                    info!("received {} actor info", records.len());
                    self.store.reset_actors(records);
                    return true;
                }
                Err(e) => {
                    failed_attempts += 1;
                    error!("error getting all actor info (attempt {failed_attempts}): {e}");
                    self.phase_tx
                        .send_replace(SyncPhase::Bootstrapping { failed_attempts });
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.retry_interval) => {}

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(RelayCommand::Shutdown) => debug!("received shutdown command"),
                        None => warn!("command channel closed, shutting down"),
                    }
                    return false;
                }
            }
        }
    }

    /// One bulk fetch. Borrows nothing from the actor, whose event stream is not `Sync`.
    async fn fetch_all(
        directory: Arc<dyn ActorDirectory>,
        deadline: Duration,
    ) -> CollectorResult<Vec<ActorRecord>> {
        let request = directory.get_all_actors(deadline);
        let reply = with_deadline(deadline, request).await?;

        if !reply.status.is_ok() {
            return Err(CollectorError::BadStatus {
                code: reply.status.code,
                message: reply.status.message,
            });
        }
        Ok(reply.actor_table_data)
    }

    async fn consume(&mut self) {
        loop {
            tokio::select! {
                message = self.events.next() => {
                    let Some(message) = message else {
                        warn!("actor subscription ended");
                        break;
                    };

                    match Self::ingest(&self.store, &message.payload) {
                        Ok(record) => trace!("upserted actor {} from {}", record.actor_id, message.topic),
                        Err(e) => error!("error receiving actor info on {}: {e}", message.topic),
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(RelayCommand::Shutdown) => debug!("received shutdown command"),
                        None => warn!("command channel closed, shutting down"),
                    }
                    break;
                }
            }
        }
    }

    /// Decode one actor event and upsert it
    pub fn ingest(store: &Store, payload: &[u8]) -> CollectorResult<ActorRecord> {
        let record: ActorRecord = serde_json::from_slice(payload)?;
        store.upsert_actor(record.clone());
        Ok(record)
    }
}

/// Handle for controlling an ActorTableActor
#[derive(Clone)]
pub struct ActorTableHandle {
    sender: mpsc::Sender<RelayCommand>,
    phase: watch::Receiver<SyncPhase>,
}

impl ActorTableHandle {
    /// Subscribe to `pattern`, then spawn the actor
    pub async fn spawn(
        store: Arc<Store>,
        directory: Arc<dyn ActorDirectory>,
        bus: &dyn MessageBus,
        pattern: &str,
        fetch_deadline: Duration,
        retry_interval: Duration,
    ) -> CollectorResult<Self> {
        let events = bus.psubscribe(pattern).await?;
        info!("subscribed to {pattern}");

        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (phase_tx, phase_rx) = watch::channel(SyncPhase::Bootstrapping { failed_attempts: 0 });

        let actor = ActorTableActor::new(
            store,
            directory,
            events,
            cmd_rx,
            phase_tx,
            fetch_deadline,
            retry_interval,
        );
        tokio::spawn(actor.run());

        Ok(Self {
            sender: cmd_tx,
            phase: phase_rx,
        })
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Resolve once the bulk fetch succeeded
    pub async fn wait_live(&self) -> Result<()> {
        let mut phase = self.phase.clone();
        let reached = phase
            .wait_for(|p| !matches!(p, SyncPhase::Bootstrapping { .. }))
            .await
            .context("actor table actor went away")?;

        match *reached {
            SyncPhase::Live => Ok(()),
            other => anyhow::bail!("actor table actor ended in {other:?}"),
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(RelayCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
