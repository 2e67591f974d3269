//! Live infrastructure state
//!
//! Everything in this module is re-created on every collection cycle. A
//! [`LiveSnapshot`] is never mutated once it has been handed out; the
//! aggregator builds a new one for every probe result.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A container as reported by the container runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveContainer {
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub image: String,

    /// Raw runtime state, e.g. "running", "exited", "Up 2 hours"
    pub runtime_status: String,

    /// Absent when the container is not running or stats are unavailable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose_project: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose_service: Option<String>,

    /// Volume names (or destinations for anonymous mounts)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<String>,

    /// Names of attached networks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
}

impl LiveContainer {
    /// Whether the runtime status reads as up/running (case-insensitive)
    pub fn is_running(&self) -> bool {
        let status = self.runtime_status.to_lowercase();
        status.contains("up") || status.contains("running")
    }
}

/// Who owns a listening port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessRuntime {
    #[serde(alias = "docker")]
    ContainerRuntime,

    #[serde(alias = "process")]
    OsProcess,

    #[serde(alias = "systemd")]
    ServiceManager,

    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ProcessRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessRuntime::ContainerRuntime => "container-runtime",
            ProcessRuntime::OsProcess => "os-process",
            ProcessRuntime::ServiceManager => "service-manager",
            ProcessRuntime::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwningProcess {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default)]
    pub runtime: ProcessRuntime,
}

/// Result of checking a single port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePort {
    pub port: u16,

    #[serde(default)]
    pub listening: bool,

    #[serde(
        default,
        rename = "process",
        alias = "owningProcess",
        skip_serializing_if = "Option::is_none"
    )]
    pub owning_process: Option<OwningProcess>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Gcp,
    Aws,
    Azure,
    #[default]
    None,
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CloudProvider::Gcp => "gcp",
            CloudProvider::Aws => "aws",
            CloudProvider::Azure => "azure",
            CloudProvider::None => "none",
        };
        write!(f, "{name}")
    }
}

/// Where the host is running, as far as cloud metadata tells
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudPlacement {
    pub detected: bool,
    pub provider: CloudProvider,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_name: Option<String>,
}

impl CloudPlacement {
    /// No provider answered
    pub fn undetected() -> Self {
        Self::default()
    }

    /// A placement on `provider` with every optional field empty
    pub fn detected(provider: CloudProvider) -> Self {
        Self {
            detected: true,
            provider,
            ..Self::default()
        }
    }
}

/// Identifies a probe and its slot in the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProbeKind {
    Containers,
    Ports,
    Cloud,
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbeKind::Containers => "containers",
            ProbeKind::Ports => "ports",
            ProbeKind::Cloud => "cloud",
        };
        write!(f, "{name}")
    }
}

/// Last known-good result of one probe plus its freshness
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSlot<T> {
    /// Last successful result, kept across failed attempts
    pub data: Option<T>,

    /// When `data` was collected
    pub last_update: Option<DateTime<Utc>>,

    pub last_attempt: Option<DateTime<Utc>>,

    /// Error of the most recent attempt, cleared on success
    pub last_error: Option<String>,

    /// The most recent attempt failed; `data` is from an earlier cycle
    pub stale: bool,
}

impl<T> Default for ProbeSlot<T> {
    fn default() -> Self {
        Self {
            data: None,
            last_update: None,
            last_attempt: None,
            last_error: None,
            stale: false,
        }
    }
}

impl<T> ProbeSlot<T> {
    pub fn record_success(&mut self, data: T, at: DateTime<Utc>) {
        self.data = Some(data);
        self.last_update = Some(at);
        self.last_attempt = Some(at);
        self.last_error = None;
        self.stale = false;
    }

    pub fn record_failure(&mut self, error: String, at: DateTime<Utc>) {
        self.last_attempt = Some(at);
        self.last_error = Some(error);
        self.stale = true;
    }

    pub fn freshness(&self) -> SlotFreshness {
        SlotFreshness {
            available: self.data.is_some(),
            last_update: self.last_update,
            last_error: self.last_error.clone(),
            stale: self.stale,
        }
    }
}

/// Freshness of one probe's data, for "last updated" displays
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotFreshness {
    pub available: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub stale: bool,
}

/// One consistent view over all probes
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    pub containers: ProbeSlot<Vec<LiveContainer>>,
    pub ports: ProbeSlot<Vec<LivePort>>,
    pub cloud: ProbeSlot<CloudPlacement>,
    pub generated_at: DateTime<Utc>,
}

impl Default for LiveSnapshot {
    fn default() -> Self {
        Self {
            containers: ProbeSlot::default(),
            ports: ProbeSlot::default(),
            cloud: ProbeSlot::default(),
            generated_at: Utc::now(),
        }
    }
}

impl LiveSnapshot {
    pub fn containers(&self) -> &[LiveContainer] {
        self.containers.data.as_deref().unwrap_or_default()
    }

    pub fn ports(&self) -> &[LivePort] {
        self.ports.data.as_deref().unwrap_or_default()
    }

    pub fn cloud(&self) -> Option<&CloudPlacement> {
        self.cloud.data.as_ref()
    }

    pub fn port(&self, port: u16) -> Option<&LivePort> {
        self.ports().iter().find(|live| live.port == port)
    }
}

/// A probe output type with a dedicated slot in [`LiveSnapshot`]
pub trait Signal: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: ProbeKind;

    fn slot(snapshot: &mut LiveSnapshot) -> &mut ProbeSlot<Self>;
}

impl Signal for Vec<LiveContainer> {
    const KIND: ProbeKind = ProbeKind::Containers;

    fn slot(snapshot: &mut LiveSnapshot) -> &mut ProbeSlot<Self> {
        &mut snapshot.containers
    }
}

impl Signal for Vec<LivePort> {
    const KIND: ProbeKind = ProbeKind::Ports;

    fn slot(snapshot: &mut LiveSnapshot) -> &mut ProbeSlot<Self> {
        &mut snapshot.ports
    }
}

impl Signal for CloudPlacement {
    const KIND: ProbeKind = ProbeKind::Cloud;

    fn slot(snapshot: &mut LiveSnapshot) -> &mut ProbeSlot<Self> {
        &mut snapshot.cloud
    }
}
