//! HTTP clients for the stats agents and the actor directory

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::trace;

use super::{ActorDirectory, ActorTableReply, StatsStub, StubFactory};
use crate::error::{CollectorError, CollectorResult};

/// Stub for a single node's agent: `GET /stats?include_memory_info=<bool>`
pub struct HttpStatsStub {
    client: reqwest::Client,
    url: Url,
}

impl HttpStatsStub {
    pub fn new(client: reqwest::Client, address: &str, port: i64) -> CollectorResult<Self> {
        let url = agent_url(address, port)?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl StatsStub for HttpStatsStub {
    async fn get_stats(
        &self,
        include_memory_info: bool,
        deadline: Duration,
    ) -> CollectorResult<Value> {
        trace!("requesting stats from {}", self.url);

        let response = self
            .client
            .get(self.url.clone())
            .query(&[("include_memory_info", include_memory_info)])
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollectorError::Timeout(deadline)
                } else {
                    CollectorError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::BadStatus {
                code: status.as_u16() as i64,
                message: status.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn endpoint(&self) -> String {
        self.url.to_string()
    }
}

/// Builds [`HttpStatsStub`]s sharing one connection pool
#[derive(Clone)]
pub struct HttpStubFactory {
    client: reqwest::Client,
}

impl HttpStubFactory {
    pub fn new() -> CollectorResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CollectorError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl StubFactory for HttpStubFactory {
    fn connect(&self, address: &str, port: i64) -> CollectorResult<Arc<dyn StatsStub>> {
        Ok(Arc::new(HttpStatsStub::new(self.client.clone(), address, port)?))
    }
}

/// Actor directory reachable over HTTP: `GET {base}/actors`
pub struct HttpActorDirectory {
    client: reqwest::Client,
    url: Url,
}

impl HttpActorDirectory {
    pub fn new(base_url: &str) -> CollectorResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| CollectorError::InvalidAddress(format!("{base_url}: {e}")))?;
        let url = base
            .join("actors")
            .map_err(|e| CollectorError::InvalidAddress(format!("{base_url}: {e}")))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CollectorError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl ActorDirectory for HttpActorDirectory {
    async fn get_all_actors(&self, deadline: Duration) -> CollectorResult<ActorTableReply> {
        let response = self
            .client
            .get(self.url.clone())
            .timeout(deadline)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollectorError::Timeout(deadline)
                } else {
                    CollectorError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::BadStatus {
                code: status.as_u16() as i64,
                message: status.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Validate a node manager address and build its stats URL
fn agent_url(address: &str, port: i64) -> CollectorResult<Url> {
    let address = address.trim();
    if address.is_empty() {
        return Err(CollectorError::InvalidAddress("empty address".into()));
    }

    let port = u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| CollectorError::InvalidAddress(format!("{address}: bad port {port}")))?;

    // bare IPv6 literals need brackets inside a URL
    let host = if address.contains(':') && !address.starts_with('[') {
        format!("[{address}]")
    } else {
        address.to_string()
    };

    let url = Url::parse(&format!("http://{host}:{port}/stats"))
        .map_err(|e| CollectorError::InvalidAddress(format!("{address}:{port}: {e}")))?;

    if url.host_str().is_none() {
        return Err(CollectorError::InvalidAddress(format!("{address}: no host")));
    }
    Ok(url)
}
