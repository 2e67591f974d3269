//! Probe collectors
//!
//! A probe queries one external system and returns a best-effort result
//! within a bounded time. Probes never share state; each one feeds its own
//! slot in the [`LiveStateAggregator`](crate::aggregator::LiveStateAggregator).
//!
//! ## Probes
//!
//! - [`container::ContainerProbe`]: containers, labels, mounts, networks and
//!   resource stats from the container runtime
//! - [`ports::PortScanProbe`]: listening state and owning process of the
//!   declared ports
//! - [`cloud::CloudMetadataProbe`]: GCP / AWS / Azure placement
//!
//! ## Failure semantics
//!
//! Any network error, timeout or malformed response yields a [`ProbeError`]
//! for that probe only. Other probes proceed independently.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::live::Signal;

pub mod cloud;
pub mod container;
pub mod error;
pub mod ports;

pub use error::{ProbeError, ProbeResult};

/// A timeout-bounded collector of one category of live signal
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    /// What the probe produces; decides which snapshot slot it feeds
    type Output: Signal;

    /// Name used in logs
    fn name(&self) -> &str;

    /// Collect once. Exceeding `timeout` abandons the attempt with
    /// [`ProbeError::Timeout`].
    async fn collect(&self, timeout: Duration) -> ProbeResult<Self::Output>;
}

/// Run `fut` with an upper bound, turning an elapsed deadline into
/// [`ProbeError::Timeout`]
pub async fn bounded<T, F>(timeout: Duration, fut: F) -> ProbeResult<T>
where
    F: Future<Output = ProbeResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}
