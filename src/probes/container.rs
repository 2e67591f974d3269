//! Container-runtime probe
//!
//! Lists every container (running and stopped) with its compose labels,
//! mounts and network attachments, then samples resource stats for the
//! running ones. Stats are best-effort: a failing stats call leaves the
//! metrics of that container empty but does not fail the probe.
//!
//! The runtime itself sits behind the [`ContainerRuntime`] trait so the probe
//! can be exercised without a Docker daemon.
//!
//! ```text
//! ┌────────────────┐
//! │ ContainerProbe │
//! └───────┬────────┘
//!         ▼
//! ┌──────────────────┐
//! │ ContainerRuntime │ (trait)
//! └──────────────────┘
//!     │          │
//!     ▼          ▼
//! ┌─────────┐ ┌──────┐
//! │ Bollard │ │ test │
//! └─────────┘ └──────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, trace, warn};

use crate::live::LiveContainer;
use crate::util::round2;

use super::{Probe, ProbeError, ProbeResult, bounded};

const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";
const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

const BYTES_PER_MB: f64 = 1_048_576.0;

/// Share of the probe timeout a single stats call may take
const STATS_BUDGET_DIVISOR: u32 = 2;

/// A container as listed by the runtime, before stats are attached
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub labels: HashMap<String, String>,
    pub mounts: Vec<String>,
    pub networks: Vec<String>,
}

/// Cumulative CPU counters of one stats sample
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuSample {
    pub total_usage: u64,
    pub system_usage: Option<u64>,
    pub online_cpus: Option<u64>,
    pub percpu_count: usize,
}

/// Two consecutive CPU samples plus current memory usage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSample {
    pub cpu: CpuSample,
    pub precpu: CpuSample,
    pub memory_usage: Option<u64>,
}

/// CPU usage in percent across all online CPUs, rounded to two decimals
///
/// A non-positive CPU or system delta yields `0.0`.
pub fn cpu_percent(stats: &StatsSample) -> f64 {
    let cpu_delta = stats.cpu.total_usage as f64 - stats.precpu.total_usage as f64;
    let system_delta = stats.cpu.system_usage.unwrap_or_default() as f64
        - stats.precpu.system_usage.unwrap_or_default() as f64;

    if cpu_delta <= 0.0 || system_delta <= 0.0 {
        return 0.0;
    }

    let online_cpus = stats
        .cpu
        .online_cpus
        .filter(|count| *count > 0)
        .map(|count| count as f64)
        .unwrap_or_else(|| stats.cpu.percpu_count.max(1) as f64);

    round2(cpu_delta / system_delta * online_cpus * 100.0)
}

/// Memory usage in whole megabytes
pub fn memory_mb(usage_bytes: u64) -> u64 {
    (usage_bytes as f64 / BYTES_PER_MB).round() as u64
}

/// Access to a container runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    /// All containers, running or not
    async fn list_containers(&self) -> ProbeResult<Vec<RuntimeContainer>>;

    /// One stats sample (current and previous CPU counters) for a container
    async fn stats(&self, id: &str) -> ProbeResult<StatsSample>;
}

/// Docker runtime backed by `bollard`
pub struct BollardRuntime {
    docker: Arc<bollard::Docker>,
}

impl BollardRuntime {
    /// Connect using the platform's default socket
    pub fn connect_local() -> ProbeResult<Self> {
        let docker = bollard::Docker::connect_with_local_defaults()
            .map_err(|e| ProbeError::Runtime(format!("failed to connect to docker: {e}")))?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connect to a specific socket, e.g. `/var/run/docker.sock`
    pub fn connect_with_socket(socket_path: &str) -> ProbeResult<Self> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    ProbeError::Runtime(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }
}

fn cpu_sample(stats: &bollard::container::CPUStats) -> CpuSample {
    CpuSample {
        total_usage: stats.cpu_usage.total_usage,
        system_usage: stats.system_cpu_usage,
        online_cpus: stats.online_cpus,
        percpu_count: stats.cpu_usage.percpu_usage.as_ref().map_or(0, Vec::len),
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn list_containers(&self) -> ProbeResult<Vec<RuntimeContainer>> {
        use bollard::container::ListContainersOptions;

        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| ProbeError::Runtime(format!("list containers failed: {e}")))?;

        let mut result = Vec::with_capacity(containers.len());
        for container in containers {
            let name = container
                .names
                .unwrap_or_default()
                .first()
                .map(|n| n.trim_start_matches('/').to_owned())
                .unwrap_or_default();

            let mounts = container
                .mounts
                .unwrap_or_default()
                .into_iter()
                .filter_map(|mount| mount.name.or(mount.destination))
                .collect();

            let mut networks: Vec<String> = container
                .network_settings
                .and_then(|settings| settings.networks)
                .map(|networks| networks.into_keys().collect())
                .unwrap_or_default();
            networks.sort();

            result.push(RuntimeContainer {
                id: container.id.unwrap_or_default(),
                name,
                image: container.image.unwrap_or_default(),
                state: container.state.or(container.status).unwrap_or_default(),
                labels: container.labels.unwrap_or_default(),
                mounts,
                networks,
            });
        }

        Ok(result)
    }

    async fn stats(&self, id: &str) -> ProbeResult<StatsSample> {
        use bollard::container::StatsOptions;
        use futures::StreamExt;

        // one_shot = false makes the daemon fill in precpu_stats
        let stream = self.docker.stats(
            id,
            Some(StatsOptions {
                stream: false,
                one_shot: false,
            }),
        );
        let mut stream = std::pin::pin!(stream);

        let stats = stream
            .next()
            .await
            .ok_or_else(|| ProbeError::Runtime(format!("no stats returned for {id}")))??;

        Ok(StatsSample {
            cpu: cpu_sample(&stats.cpu_stats),
            precpu: cpu_sample(&stats.precpu_stats),
            memory_usage: stats.memory_stats.usage,
        })
    }
}

/// Probe producing [`LiveContainer`]s from a [`ContainerRuntime`]
pub struct ContainerProbe {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerProbe {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    async fn snapshot(&self, stats_budget: Duration) -> ProbeResult<Vec<LiveContainer>> {
        let mut listed = self.runtime.list_containers().await?;
        // sorted so "first match wins" during reconciliation is stable
        listed.sort_by(|a, b| a.name.cmp(&b.name));

        let containers: Vec<LiveContainer> = listed.into_iter().map(into_live).collect();

        let samples = futures::future::join_all(containers.iter().map(|container| async move {
            if !container.is_running() {
                return None;
            }

            match tokio::time::timeout(stats_budget, self.runtime.stats(&container.id)).await {
                Ok(Ok(sample)) => Some(sample),
                Ok(Err(e)) => {
                    warn!("stats unavailable for {}: {}", container.name, e);
                    None
                }
                Err(_) => {
                    warn!(
                        "stats for {} took longer than {:?}",
                        container.name, stats_budget
                    );
                    None
                }
            }
        }))
        .await;

        let containers = containers
            .into_iter()
            .zip(samples)
            .map(|(mut container, sample)| {
                if let Some(sample) = sample {
                    container.cpu_percent = Some(cpu_percent(&sample));
                    container.memory_mb = sample.memory_usage.map(memory_mb);
                }
                container
            })
            .collect::<Vec<_>>();

        trace!("collected {} containers", containers.len());
        Ok(containers)
    }
}

fn into_live(container: RuntimeContainer) -> LiveContainer {
    let RuntimeContainer {
        id,
        name,
        image,
        state,
        mut labels,
        mounts,
        networks,
    } = container;

    LiveContainer {
        id,
        name,
        image,
        runtime_status: state,
        cpu_percent: None,
        memory_mb: None,
        compose_project: labels.remove(COMPOSE_PROJECT_LABEL),
        compose_service: labels.remove(COMPOSE_SERVICE_LABEL),
        mounts,
        networks,
    }
}

#[async_trait]
impl Probe for ContainerProbe {
    type Output = Vec<LiveContainer>;

    fn name(&self) -> &str {
        "containers"
    }

    #[instrument(skip(self))]
    async fn collect(&self, timeout: Duration) -> ProbeResult<Vec<LiveContainer>> {
        let result = bounded(timeout, self.snapshot(timeout / STATS_BUDGET_DIVISOR)).await;
        if let Err(e) = &result {
            debug!("container probe unavailable: {e}");
        }
        result
    }
}
