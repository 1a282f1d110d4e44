//! In-process publish/subscribe bus
//!
//! Backed by a single tokio broadcast channel; every subscription filters
//! the shared stream by exact topic or by a Redis-style glob pattern
//! (`*` any run of characters, `?` exactly one). Slow subscribers that lag
//! behind the channel capacity lose the skipped messages and keep going.

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, trace, warn};

use super::{BusMessage, BusStream, MessageBus};
use crate::error::{CollectorError, CollectorResult};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<BusMessage>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a message, returning the number of open subscriptions.
    ///
    /// Topic filtering happens on the subscriber side, so the count
    /// includes subscriptions that will skip the message.
    pub fn publish(&self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> usize {
        let message = BusMessage {
            topic: topic.into(),
            payload: payload.into(),
        };
        trace!("publishing on {}", message.topic);

        // no subscribers is fine
        self.tx.send(message).unwrap_or(0)
    }

    fn stream(&self, filter: TopicFilter) -> BusStream {
        let rx = self.tx.subscribe();

        futures::stream::unfold((rx, filter), |(mut rx, filter)| async move {
            loop {
                match rx.recv().await {
                    Ok(message) if filter.matches(&message.topic) => {
                        return Some((message, (rx, filter)));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("subscription {filter} lagged, skipped {skipped} messages");
                    }
                    Err(RecvError::Closed) => {
                        debug!("bus closed, ending subscription {filter}");
                        return None;
                    }
                }
            }
        })
        .boxed()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl MessageBus for LocalBus {
    async fn subscribe(&self, topic: &str) -> CollectorResult<BusStream> {
        Ok(self.stream(TopicFilter::Exact(topic.to_string())))
    }

    async fn psubscribe(&self, pattern: &str) -> CollectorResult<BusStream> {
        let regex = glob_to_regex(pattern)?;
        Ok(self.stream(TopicFilter::Pattern(regex)))
    }
}

enum TopicFilter {
    Exact(String),
    Pattern(Regex),
}

impl TopicFilter {
    fn matches(&self, topic: &str) -> bool {
        match self {
            TopicFilter::Exact(expected) => expected == topic,
            TopicFilter::Pattern(regex) => regex.is_match(topic),
        }
    }
}

impl std::fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopicFilter::Exact(topic) => write!(f, "{topic}"),
            TopicFilter::Pattern(regex) => write!(f, "{}", regex.as_str()),
        }
    }
}

pub(crate) fn glob_to_regex(pattern: &str) -> CollectorResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr).map_err(|e| CollectorError::Subscribe(format!("bad pattern {pattern}: {e}")))
}
