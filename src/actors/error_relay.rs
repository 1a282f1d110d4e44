//! ErrorRelayActor - Files published error events under their process
//!
//! Error events do not carry a process identity of their own. The relay
//! strips terminal colors from the message and looks for the
//! `(pid=…, ip=…)` tag (see [`crate::parse`]); events without one are
//! dropped, as there is no key to file them under.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::CollectorResult;
use crate::parse::{extract_process_key, strip_ansi};
use crate::store::{ProcessKey, Store};
use crate::transport::{BusStream, MessageBus};
use crate::{ErrorEvent, ErrorRecord};

use super::messages::RelayCommand;

pub struct ErrorRelayActor {
    store: Arc<Store>,
    events: BusStream,
    command_rx: mpsc::Receiver<RelayCommand>,
}

impl ErrorRelayActor {
    pub fn new(store: Arc<Store>, events: BusStream, command_rx: mpsc::Receiver<RelayCommand>) -> Self {
        Self {
            store,
            events,
            command_rx,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting error relay actor");

        loop {
            tokio::select! {
                message = self.events.next() => {
                    let Some(message) = message else {
                        warn!("error subscription ended");
                        break;
                    };

                    match Self::ingest(&self.store, &message.payload) {
                        Ok(Some(key)) => trace!("received error entry for {} {}", key.host, key.pid),
                        Ok(None) => warn!("dropping error event on {} without a (pid, ip) tag", message.topic),
                        Err(e) => error!("error receiving error info: {e}"),
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

        debug!("error relay actor stopped");
    }

    /// Decode, normalize and store one error event.
    ///
    /// Returns the key it was filed under, or `None` if it was dropped.
    pub fn ingest(store: &Store, payload: &[u8]) -> CollectorResult<Option<ProcessKey>> {
        let event: ErrorEvent = serde_json::from_slice(payload)?;
        let message = strip_ansi(&event.error_message);

        let Some(key) = extract_process_key(&message) else {
            return Ok(None);
        };

        store.append_error(
            key.clone(),
            ErrorRecord {
                message,
                timestamp: event.timestamp,
                error_type: event.error_type,
            },
        );
        Ok(Some(key))
    }
}

/// Handle for controlling an ErrorRelayActor
#[derive(Clone)]
pub struct ErrorRelayHandle {
    sender: mpsc::Sender<RelayCommand>,
}

impl ErrorRelayHandle {
    /// Subscribe to `pattern`, then spawn the relay
    pub async fn spawn(
        store: Arc<Store>,
        bus: &dyn MessageBus,
        pattern: &str,
    ) -> CollectorResult<Self> {
        let events = bus.psubscribe(pattern).await?;
        info!("subscribed to {pattern}");

        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        tokio::spawn(ErrorRelayActor::new(store, events, cmd_rx).run());

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
