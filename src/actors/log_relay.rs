//! LogRelayActor - Appends published log batches to the store

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::LogBatch;
use crate::error::CollectorResult;
use crate::store::Store;
use crate::transport::{BusStream, MessageBus};

use super::messages::RelayCommand;

pub struct LogRelayActor {
    store: Arc<Store>,
    batches: BusStream,
    command_rx: mpsc::Receiver<RelayCommand>,
}

impl LogRelayActor {
    pub fn new(store: Arc<Store>, batches: BusStream, command_rx: mpsc::Receiver<RelayCommand>) -> Self {
        Self {
            store,
            batches,
            command_rx,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting log relay actor");

        loop {
            tokio::select! {
                message = self.batches.next() => {
                    let Some(message) = message else {
                        warn!("log subscription ended");
                        break;
                    };

                    match Self::ingest(&self.store, &message.payload) {
                        Ok(batch) => trace!(
                            "received {} log lines for {} and {}",
                            batch.lines.len(), batch.host, batch.pid
                        ),
                        Err(e) => error!("error receiving log info: {e}"),
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

        debug!("log relay actor stopped");
    }

    /// Decode one batch and append its lines
    pub fn ingest(store: &Store, payload: &[u8]) -> CollectorResult<LogBatch> {
        let batch: LogBatch = serde_json::from_slice(payload)?;
        let evicted = store.append_logs(batch.clone());
        if evicted > 0 {
            trace!("evicted {evicted} old log lines of {} {}", batch.host, batch.pid);
        }
        Ok(batch)
    }
}

/// Handle for controlling a LogRelayActor
#[derive(Clone)]
pub struct LogRelayHandle {
    sender: mpsc::Sender<RelayCommand>,
}

impl LogRelayHandle {
    /// Subscribe to `topic`, then spawn the relay
    pub async fn spawn(store: Arc<Store>, bus: &dyn MessageBus, topic: &str) -> CollectorResult<Self> {
        let batches = bus.subscribe(topic).await?;
        info!("subscribed to {topic}");

        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        tokio::spawn(LogRelayActor::new(store, batches, cmd_rx).run());

        Ok(Self { sender: cmd_tx })
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(RelayCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
