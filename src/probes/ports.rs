//! Port-scan probe
//!
//! Asks the local port-scan endpoint whether the declared host ports are
//! listening and which process owns them. The endpoint answers
//! `GET <url>?ports=80,5432` with:
//!
//! ```json
//! { "ports": [ { "port": 5432, "listening": true, "process": { "pid": 812, "command": "postgres", "runtime": "docker" } } ] }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, trace};

use crate::live::LivePort;

use super::{Probe, ProbeError, ProbeResult, bounded};

#[derive(Debug, Deserialize)]
struct PortScanResponse {
    #[serde(default)]
    ports: Vec<LivePort>,
}

/// Probe checking a fixed set of ports through the port-scan endpoint
pub struct PortScanProbe {
    /// HTTP client (reused across requests)
    client: reqwest::Client,

    url: String,

    /// Ports harvested from the declared architecture
    ports: Vec<u16>,
}

impl PortScanProbe {
    pub fn new(url: impl Into<String>, ports: Vec<u16>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            ports,
        }
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    fn request_url(&self) -> String {
        let query = self
            .ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{separator}ports={query}", self.url)
    }

    async fn scan(&self) -> ProbeResult<Vec<LivePort>> {
        if self.ports.is_empty() {
            return Ok(vec![]);
        }

        let url = self.request_url();
        trace!("requesting port scan from {url}");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        let parsed: PortScanResponse = serde_json::from_str(&body)?;

        // only keep what was asked for, one entry per port
        let mut ports: Vec<LivePort> = parsed
            .ports
            .into_iter()
            .filter(|live| self.ports.contains(&live.port))
            .collect();
        ports.sort_by_key(|live| live.port);
        ports.dedup_by_key(|live| live.port);

        trace!(
            "{} of {} ports listening",
            ports.iter().filter(|live| live.listening).count(),
            ports.len()
        );
        Ok(ports)
    }
}

#[async_trait]
impl Probe for PortScanProbe {
    type Output = Vec<LivePort>;

    fn name(&self) -> &str {
        "ports"
    }

    #[instrument(skip(self), fields(ports = self.ports.len()))]
    async fn collect(&self, timeout: Duration) -> ProbeResult<Vec<LivePort>> {
        let result = bounded(timeout, self.scan()).await;
        if let Err(e) = &result {
            debug!("port scan unavailable: {e}");
        }
        result
    }
}
